/// Outcome counters for one exoself invocation.
///
/// Conservation: `accepted + rejected <= candidate_evaluations` and
/// `candidate_evaluations <= attempts_planned`. Executed attempts fall
/// short of planned ones on cancellation or a goal hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TuneReport {
    pub attempts_planned: usize,
    pub attempts_executed: usize,
    pub candidate_evaluations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub goal_reached: bool,
}

impl TuneReport {
    pub fn new(attempts_planned: usize) -> Self {
        TuneReport {
            attempts_planned,
            ..TuneReport::default()
        }
    }
}
