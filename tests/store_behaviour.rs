// tests/store_behaviour.rs

//! Contract tests run against both store backends.

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::Arc;

use ciwatch::store::{MemoryStore, RunId, RunState, RunStore, SqliteStore, StoreError};

type TestResult = Result<(), Box<dyn Error>>;

fn both_stores() -> Vec<(&'static str, Box<dyn RunStore>)> {
    init_tracing();
    vec![
        ("memory", Box::new(MemoryStore::new()) as Box<dyn RunStore>),
        (
            "sqlite",
            Box::new(SqliteStore::open_in_memory().expect("open sqlite")) as Box<dyn RunStore>,
        ),
    ]
}

#[test]
fn create_then_get_roundtrip() -> TestResult {
    for (name, store) in both_stores() {
        let id = RunId::from("run-1");
        store.create(&id)?;

        let run = store.get(&id)?.unwrap_or_else(|| panic!("{name}: run missing"));
        assert_eq!(run.id, id, "{name}");
        assert_eq!(run.state, RunState::Running, "{name}");
        assert_eq!(run.output, "", "{name}");
        assert!(run.created_at_ms > 0, "{name}");
        assert_eq!(run.success(), None, "{name}");
    }
    Ok(())
}

#[test]
fn duplicate_id_is_rejected() -> TestResult {
    for (name, store) in both_stores() {
        let id = RunId::from("run-1");
        store.create(&id)?;
        let err = store.create(&id).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)), "{name}: {err}");
    }
    Ok(())
}

#[test]
fn appends_accumulate_in_order() -> TestResult {
    for (name, store) in both_stores() {
        let id = RunId::from("run-1");
        store.create(&id)?;
        store.append_output(&id, "first ")?;
        store.append_output(&id, "second ")?;
        store.append_output(&id, "third")?;

        let run = store.get(&id)?.expect("run present");
        assert_eq!(run.output, "first second third", "{name}");
    }
    Ok(())
}

#[test]
fn finalize_freezes_the_record() -> TestResult {
    for (name, store) in both_stores() {
        let id = RunId::from("run-1");
        store.create(&id)?;
        store.append_output(&id, "partial")?;
        store.finalize(&id, true, "final transcript")?;

        // Late append after finalization is a no-op, not an error.
        store.append_output(&id, " trailing")?;
        // So is a second finalize; the first outcome wins.
        store.finalize(&id, false, "rewritten")?;

        let run = store.get(&id)?.expect("run present");
        assert_eq!(run.state, RunState::Succeeded, "{name}");
        assert_eq!(run.output, "final transcript", "{name}");
    }
    Ok(())
}

#[test]
fn operations_on_missing_ids_are_noops() -> TestResult {
    for (name, store) in both_stores() {
        let id = RunId::from("ghost");
        store.append_output(&id, "chunk")?;
        store.finalize(&id, true, "output")?;
        assert!(store.get(&id)?.is_none(), "{name}");
    }
    Ok(())
}

#[test]
fn list_returns_newest_first() -> TestResult {
    for (name, store) in both_stores() {
        let ids: Vec<RunId> = (0..3).map(|_| RunId::generate()).collect();
        for id in &ids {
            store.create(id)?;
        }

        let listed: Vec<RunId> = store.list_all()?.into_iter().map(|run| run.id).collect();
        let expected: Vec<RunId> = ids.iter().rev().cloned().collect();
        assert_eq!(listed, expected, "{name}");
    }
    Ok(())
}

#[test]
fn sqlite_reopen_preserves_history() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("runs.db");

    let id = RunId::from("run-1");
    {
        let store = SqliteStore::open(&path)?;
        store.create(&id)?;
        store.append_output(&id, "persisted output")?;
        store.finalize(&id, false, "persisted output")?;
    }

    let store = SqliteStore::open(&path)?;
    let run = store.get(&id)?.expect("run survives reopen");
    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.output, "persisted output");
    assert_eq!(store.list_all()?.len(), 1);
    Ok(())
}

#[test]
fn sqlite_creates_parent_directories() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested/data/runs.db");

    let store = SqliteStore::open(&path)?;
    store.create(&RunId::from("run-1"))?;
    assert!(path.exists());
    Ok(())
}

#[test]
fn concurrent_appends_are_all_recorded() -> TestResult {
    init_tracing();
    let store = Arc::new(SqliteStore::open_in_memory()?);
    let id = RunId::from("run-1");
    store.create(&id)?;

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let store = Arc::clone(&store);
            let id = id.clone();
            scope.spawn(move || {
                for i in 0..10 {
                    store
                        .append_output(&id, &format!("[{worker}:{i}]"))
                        .expect("append");
                }
            });
        }
    });

    let run = store.get(&id)?.expect("run present");
    for worker in 0..8 {
        for i in 0..10 {
            assert!(run.output.contains(&format!("[{worker}:{i}]")));
        }
    }
    Ok(())
}
