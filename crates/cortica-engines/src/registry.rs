use crate::command::{Controller, MonitorCommand};
use cortica_core::{CorticaResult, RunId, cortica_bail};
use hashbrown::HashMap;
use std::sync::Mutex;

/// Maps live run ids to their control channels. Insert and remove are the
/// only mutating operations, both under the registry mutex; the mutex is a
/// leaf lock and is never held across a send.
#[derive(Default)]
pub struct RunRegistry {
    inner: Mutex<HashMap<RunId, Controller>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        RunRegistry::default()
    }

    pub fn register(&self, run_id: RunId, controller: Controller) {
        self.inner.lock().unwrap().insert(run_id, controller);
    }

    pub fn unregister(&self, run_id: RunId) {
        self.inner.lock().unwrap().remove(&run_id);
    }

    pub fn is_active(&self, run_id: RunId) -> bool {
        self.inner.lock().unwrap().contains_key(&run_id)
    }

    pub fn active_runs(&self) -> Vec<RunId> {
        let mut runs = self.inner.lock().unwrap().keys().copied().collect::<Vec<_>>();
        runs.sort();
        runs
    }

    /// Send a command to a registered run. `Ok(false)` means the channel
    /// was full and the command dropped. A run that terminated since
    /// registration is unregistered on the way out.
    pub fn send(&self, run_id: RunId, command: MonitorCommand) -> CorticaResult<bool> {
        let controller = {
            let inner = self.inner.lock().unwrap();
            inner.get(&run_id).cloned()
        };

        let Some(controller) = controller else {
            cortica_bail!(RunNotActive: "no control channel registered for {}", run_id);
        };

        match controller.send(command) {
            Ok(delivered) => Ok(delivered),
            Err(err) => {
                self.unregister(run_id);
                Err(err)
            }
        }
    }
}
