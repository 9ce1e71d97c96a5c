use crate::builder::MonitorBuilder;
use crate::command::MonitorCommand;
use crate::registry::RunRegistry;
use crate::result::RunResult;
use cortica_core::{
    CancelToken, CorticaResult, NullStorage, RunId, Scape, Storage, cortica_err,
};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// The process handle for the neuro-evolution core: scape registry, run
/// control registry and the storage collaborator.
///
/// There is deliberately no process-wide default instance; embedders create
/// a `Polis` at startup and thread it (or an `Arc` of it) through their
/// code.
pub struct Polis {
    scapes: Mutex<HashMap<String, Arc<dyn Scape>>>,
    registry: Arc<RunRegistry>,
    storage: Arc<dyn Storage>,
    next_run: AtomicU64,
}

impl Polis {
    pub fn new() -> Self {
        Polis::with_storage(Arc::new(NullStorage))
    }

    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        Polis {
            scapes: Mutex::new(HashMap::new()),
            registry: Arc::new(RunRegistry::new()),
            storage,
            next_run: AtomicU64::new(0),
        }
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.storage)
    }

    pub fn registry(&self) -> Arc<RunRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn register_scape(&self, scape: Arc<dyn Scape>) {
        self.scapes
            .lock()
            .unwrap()
            .insert(scape.name().to_string(), scape);
    }

    /// Look up a registered scape by name.
    pub fn scape(&self, name: &str) -> CorticaResult<Arc<dyn Scape>> {
        self.scapes
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| cortica_err!(ScapeNotRegistered: "no scape registered under {:?}", name))
    }

    pub fn next_run_id(&self) -> RunId {
        RunId(self.next_run.fetch_add(1, Ordering::Relaxed))
    }

    /// Send a control command to a live run.
    pub fn command(&self, run_id: RunId, command: MonitorCommand) -> CorticaResult<bool> {
        self.registry.send(run_id, command)
    }

    /// Build the monitor from `builder` and run it on a dedicated thread.
    ///
    /// The polis assigns the run id, injects its storage collaborator, and
    /// registers the control channel for the lifetime of the run; the
    /// returned handle joins to the final [RunResult].
    pub fn launch(&self, builder: MonitorBuilder) -> CorticaResult<RunHandle> {
        let run_id = self.next_run_id();
        let (monitor, controller) = builder
            .run_id(run_id)
            .storage(self.storage())
            .build()?;

        let token = monitor.cancel_token();
        self.registry.register(run_id, controller.clone());

        let registry = Arc::clone(&self.registry);
        let handle = std::thread::Builder::new()
            .name(format!("{run_id}"))
            .spawn(move || {
                let result = monitor.run();
                registry.unregister(run_id);
                result
            })
            .map_err(|err| cortica_err!(Storage: "failed to spawn run thread: {}", err))?;

        Ok(RunHandle {
            run_id,
            controller,
            token,
            handle,
        })
    }
}

impl Default for Polis {
    fn default() -> Self {
        Polis::new()
    }
}

/// A live run launched by [Polis::launch].
pub struct RunHandle {
    run_id: RunId,
    controller: crate::command::Controller,
    token: CancelToken,
    handle: JoinHandle<CorticaResult<RunResult>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Non-blocking command send; see [crate::Controller::send].
    pub fn control(&self, command: MonitorCommand) -> CorticaResult<bool> {
        self.controller.send(command)
    }

    /// Cancel the run's token tree.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to terminate and return its result.
    pub fn join(self) -> CorticaResult<RunResult> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(cortica_err!(Evaluation: "run {} panicked", self.run_id)),
        }
    }
}
