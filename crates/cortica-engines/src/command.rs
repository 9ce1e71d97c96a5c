use cortica_core::RunId;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

/// Commands a live run understands. The monitor consumes them at
/// generation boundaries; `Stop` is additionally observed at tuner attempt
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    Pause,
    Continue,
    Stop,
    /// Force goal-termination, as if the scape had reported the goal.
    GoalReached,
    /// Log the latest diagnostics row.
    PrintTrace,
}

pub(crate) const CONTROL_CHANNEL_BOUND: usize = 16;

/// Sender half of a run's control channel. Sends never block: a full
/// channel drops the command and reports it so the caller may retry.
#[derive(Clone, Debug)]
pub struct Controller {
    run_id: RunId,
    sender: SyncSender<MonitorCommand>,
}

impl Controller {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns `Ok(true)` when delivered, `Ok(false)` when the channel was
    /// full and the command was dropped, and `Err(RunNotActive)` once the
    /// run has terminated.
    pub fn send(&self, command: MonitorCommand) -> cortica_core::CorticaResult<bool> {
        match self.sender.try_send(command) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(cortica_core::cortica_err!(
                RunNotActive: "run {} is no longer consuming commands", self.run_id
            )),
        }
    }
}

/// Build the bounded control channel for one run.
pub(crate) fn control_channel(run_id: RunId) -> (Controller, Receiver<MonitorCommand>) {
    let (sender, receiver) = sync_channel(CONTROL_CHANNEL_BOUND);
    (Controller { run_id, sender }, receiver)
}
