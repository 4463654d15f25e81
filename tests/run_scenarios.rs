// tests/run_scenarios.rs

//! End-to-end executor behaviour against real subprocesses.

#![cfg(unix)]

mod common;
use crate::common::{harness, harness_with, harness_with_webhook, script_printing};

use std::error::Error;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast::Receiver;
use tokio::time::{Duration, timeout};

use ciwatch::events::RunEvent;
use ciwatch::snapshot::AcquireError;
use ciwatch::store::RunState;

type TestResult = Result<(), Box<dyn Error>>;

/// Wait until `n` completion events have arrived, failing the test if they
/// don't show up within a few seconds.
async fn wait_for_completions(rx: &mut Receiver<RunEvent>, n: usize) {
    let mut seen = 0;
    while seen < n {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for completion events")
            .expect("event bus closed early");
        if matches!(event, RunEvent::Completed { .. }) {
            seen += 1;
        }
    }
}

#[tokio::test]
async fn successful_run_records_output_and_state() -> TestResult {
    let h = harness();
    h.provider
        .add_script("ci.sh", script_printing(&["building", "tests passed"], 0));

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Succeeded);
    assert_eq!(run.success(), Some(true));
    assert!(run.output.contains("building\n"));
    assert!(run.output.contains("tests passed\n"));
    assert!(run.output.find("building") < run.output.find("tests passed"));

    let stored = h.store.get(&run.id)?.expect("run present in store");
    assert_eq!(stored.state, RunState::Succeeded);
    assert_eq!(stored.output, run.output);
    Ok(())
}

#[tokio::test]
async fn failing_run_keeps_output_plain() -> TestResult {
    let h = harness();
    h.provider
        .add_script("ci.sh", "#!/bin/sh\necho 'boom' 1>&2\nexit 3\n");

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.output.contains("boom"));
    // A nonzero exit is an ordinary failure; no synthetic error line is added.
    assert!(!run.output.contains("Error:"));
    Ok(())
}

#[tokio::test]
async fn silent_failure_leaves_output_empty() -> TestResult {
    let h = harness();
    h.provider.add_script("ci.sh", "#!/bin/sh\nexit 1\n");

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(run.output, "");
    Ok(())
}

#[tokio::test]
async fn silent_success_leaves_output_empty() -> TestResult {
    let h = harness();
    h.provider.add_script("ci.sh", "#!/bin/sh\nexit 0\n");

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Succeeded);
    assert_eq!(run.output, "");
    Ok(())
}

#[tokio::test]
async fn stdout_and_stderr_are_both_captured() -> TestResult {
    let h = harness();
    h.provider.add_script(
        "ci.sh",
        "#!/bin/sh\necho 'to stdout'\necho 'to stderr' 1>&2\nexit 0\n",
    );

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Succeeded);
    assert!(run.output.contains("to stdout"));
    assert!(run.output.contains("to stderr"));
    Ok(())
}

#[tokio::test]
async fn missing_entry_point_fails_with_error_line() -> TestResult {
    // The fetch produces an empty working copy; no ci.sh anywhere.
    let h = harness();

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Failed);
    assert_eq!(
        run.output,
        "Error: entry point ci.sh not found in repository\n"
    );
    Ok(())
}

#[tokio::test]
async fn non_executable_entry_point_fails() -> TestResult {
    let h = harness();
    h.provider.add_file("ci.sh", "#!/bin/sh\nexit 0\n");

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.output.contains("is not executable"));
    Ok(())
}

#[tokio::test]
async fn acquire_failure_finalizes_run_as_failed() -> TestResult {
    let h = harness();
    h.provider
        .fail_next_fetch(AcquireError::Auth("token rejected".to_string()));

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.output.starts_with("Error: failed to acquire source"));
    assert!(run.output.contains("token rejected"));
    Ok(())
}

#[tokio::test]
async fn nested_entry_point_is_supported() -> TestResult {
    let h = harness_with(|builder| builder.entry_point("scripts/ci.sh"));
    h.provider
        .add_script("scripts/ci.sh", script_printing(&["nested ok"], 0));

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Succeeded);
    assert!(run.output.contains("nested ok"));
    Ok(())
}

#[tokio::test]
async fn working_copy_is_removed_after_run() -> TestResult {
    let h = harness();
    h.provider
        .add_script("ci.sh", script_printing(&["cleanup check"], 0));

    h.executor.run_to_completion().await?;

    let leftovers: Vec<_> = std::fs::read_dir(h.workdir.path())?.collect();
    assert!(leftovers.is_empty(), "workdir not cleaned: {leftovers:?}");
    Ok(())
}

#[tokio::test]
async fn timed_out_run_is_killed_and_failed() -> TestResult {
    let h = harness_with(|builder| builder.timeout_seconds(1));
    h.provider.add_script(
        "ci.sh",
        "#!/bin/sh\necho 'started'\nsleep 30\necho 'done'\nexit 0\n",
    );

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Failed);
    assert!(run.output.contains("started"));
    assert!(run.output.contains("timed out after 1 seconds"));
    assert!(!run.output.contains("done"));
    Ok(())
}

#[tokio::test]
async fn single_flight_serializes_overlapping_runs() -> TestResult {
    let h = harness();

    // Both runs append to a file outside their working copies, so overlap
    // would show up as interleaved markers.
    let log_dir = tempfile::tempdir()?;
    let log = log_dir.path().join("order.log");
    h.provider.add_script(
        "ci.sh",
        format!(
            "#!/bin/sh\necho start >> {log}\nsleep 0.3\necho end >> {log}\n",
            log = log.display()
        ),
    );

    let mut rx = h.bus.subscribe();
    let first = h.executor.start()?;
    let second = h.executor.start()?;
    assert_ne!(first, second);

    wait_for_completions(&mut rx, 2).await;

    let order = std::fs::read_to_string(&log)?;
    let markers: Vec<&str> = order.split_whitespace().collect();
    assert_eq!(markers, vec!["start", "end", "start", "end"]);

    let runs = h.store.list_all()?;
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|run| run.state == RunState::Succeeded));
    Ok(())
}

/// Accept one HTTP request, answer it with 200, and hand back its body.
async fn receive_webhook(listener: TcpListener) -> String {
    let (mut socket, _) = listener.accept().await.expect("accept webhook connection");
    let mut raw = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let read = socket.read(&mut chunk).await.expect("read webhook request");
        assert!(read > 0, "connection closed before the full request arrived");
        raw.extend_from_slice(&chunk[..read]);
        if let Some(body) = body_when_complete(&raw) {
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
                .await
                .expect("answer webhook request");
            return body;
        }
    }
}

/// The request body, once the headers and the advertised content-length have
/// fully arrived.
fn body_when_complete(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text.split_once("\r\n\r\n")?;
    let length: usize = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.eq_ignore_ascii_case("content-length")
            .then(|| value.trim().parse().ok())
            .flatten()
    })?;
    (body.len() >= length).then(|| body[..length].to_string())
}

#[tokio::test]
async fn completion_webhook_receives_camel_case_payload() -> TestResult {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}/notify", listener.local_addr()?);
    let delivery = tokio::spawn(receive_webhook(listener));

    let h = harness_with_webhook(&url);
    h.provider
        .add_script("ci.sh", script_printing(&["notified"], 0));

    let run = h.executor.run_to_completion().await?;
    assert_eq!(run.state, RunState::Succeeded);

    let body = timeout(Duration::from_secs(5), delivery)
        .await
        .expect("timed out waiting for the webhook")?;
    let payload: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(payload["runId"], run.id.as_str());
    assert_eq!(payload["success"], true);
    let timestamp = payload["timestamp"]
        .as_str()
        .ok_or("timestamp is not a string")?;
    OffsetDateTime::parse(timestamp, &Rfc3339)?;
    Ok(())
}

#[tokio::test]
async fn unreachable_webhook_leaves_run_state_alone() -> TestResult {
    // Bind to grab a free port, then drop the listener so the POST is
    // refused outright.
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}/notify", listener.local_addr()?);
    drop(listener);

    let h = harness_with_webhook(&url);
    h.provider
        .add_script("ci.sh", script_printing(&["still fine"], 0));

    let run = h.executor.run_to_completion().await?;

    assert_eq!(run.state, RunState::Succeeded);
    assert_eq!(run.output, "still fine\n");
    let stored = h.store.get(&run.id)?.expect("run present in store");
    assert_eq!(stored.state, RunState::Succeeded);
    assert_eq!(stored.output, "still fine\n");
    Ok(())
}
