#![allow(dead_code)]

#[allow(unused_imports)]
pub use ciwatch_test_utils::{init_tracing, with_timeout};

use std::sync::Arc;

use tempfile::TempDir;

use ciwatch::config::RunnerSection;
use ciwatch::events::EventBus;
use ciwatch::run::{CompletionWebhook, RunExecutor};
use ciwatch::snapshot::MockSnapshotProvider;
use ciwatch::store::{MemoryStore, RunStore};
use ciwatch_test_utils::builders::RunnerSectionBuilder;

/// An executor wired against a mock provider and an in-memory store, with
/// working copies placed in a temp directory that lives as long as the
/// harness.
pub struct TestHarness {
    pub store: Arc<dyn RunStore>,
    pub provider: MockSnapshotProvider,
    pub bus: EventBus,
    pub executor: Arc<RunExecutor>,
    pub workdir: TempDir,
}

pub fn harness() -> TestHarness {
    harness_with(|builder| builder)
}

pub fn harness_with(
    tweak: impl FnOnce(RunnerSectionBuilder) -> RunnerSectionBuilder,
) -> TestHarness {
    assemble(tweak, None)
}

/// Like [`harness`], but with completion notifications posted to `url`.
pub fn harness_with_webhook(url: &str) -> TestHarness {
    assemble(|builder| builder, Some(CompletionWebhook::new(url)))
}

fn assemble(
    tweak: impl FnOnce(RunnerSectionBuilder) -> RunnerSectionBuilder,
    webhook: Option<CompletionWebhook>,
) -> TestHarness {
    init_tracing();

    let workdir = tempfile::tempdir().expect("create temp workdir");
    let runner: RunnerSection = tweak(RunnerSectionBuilder::new(workdir.path())).build();

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    let provider = MockSnapshotProvider::new();
    let bus = EventBus::new();
    let executor = Arc::new(RunExecutor::new(
        Arc::clone(&store),
        Arc::new(provider.clone()),
        bus.clone(),
        &runner,
        webhook,
    ));

    TestHarness {
        store,
        provider,
        bus,
        executor,
        workdir,
    }
}

/// A `/bin/sh` script printing each line to stdout, then exiting with `code`.
pub fn script_printing(lines: &[&str], code: i32) -> String {
    let mut script = String::from("#!/bin/sh\n");
    for line in lines {
        script.push_str(&format!("echo '{line}'\n"));
    }
    script.push_str(&format!("exit {code}\n"));
    script
}
