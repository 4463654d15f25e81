use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ciwatch::errors::Result;
use ciwatch::run::RunLauncher;
use ciwatch::store::RunId;

/// A fake launcher that:
/// - records the ids it handed out (without running anything)
/// - can be told to fail its next launch.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    launched: Arc<Mutex<Vec<RunId>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<RunId> {
        self.launched.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    /// Make the next `launch` call return an error.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

impl RunLauncher for FakeLauncher {
    fn launch(&self) -> Pin<Box<dyn Future<Output = Result<RunId>> + Send + '_>> {
        let launched = Arc::clone(&self.launched);
        let fail = std::mem::take(&mut *self.fail_next.lock().unwrap());

        Box::pin(async move {
            if fail {
                return Err(anyhow::anyhow!("scripted launch failure").into());
            }
            let id = RunId::generate();
            launched.lock().unwrap().push(id.clone());
            Ok(id)
        })
    }
}
