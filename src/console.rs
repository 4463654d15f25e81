// src/console.rs

//! Console mirror of the event bus.
//!
//! Run output goes to stdout exactly as the subprocess produced it; tracing
//! stays on stderr, so piping stdout captures only run output.

use std::io::Write;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::RunEvent;

/// Print every event until the bus closes. Used in service mode.
pub fn spawn_follower(mut rx: Receiver<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "console follower lagging, some output was skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Print output chunks until the first completion event. Used by `--run-now`,
/// where exactly one run is in flight.
pub async fn follow_run(mut rx: Receiver<RunEvent>) {
    loop {
        match rx.recv().await {
            Ok(RunEvent::Output { chunk, .. }) => print_chunk(&chunk),
            Ok(RunEvent::Completed { .. }) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console follower lagging, some output was skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::ChangeDetected { run_id, commit } => {
            println!(
                "[{run_id}] commit {} by {}: {}",
                commit.short_id, commit.author, commit.title
            );
        }
        RunEvent::Output { chunk, .. } => print_chunk(chunk),
        RunEvent::Completed { run_id, success } => {
            println!("[{run_id}] {}", if *success { "succeeded" } else { "failed" });
        }
    }
}

/// Chunks already carry their own line breaks; flush so partial lines show
/// up while the process is still writing.
fn print_chunk(chunk: &str) {
    print!("{chunk}");
    let _ = std::io::stdout().flush();
}
