use cortica_core::{
    GenerationDiagnostics, LineageRecord, RunId, ScoredGenome, SpeciesHistory,
};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// All configured generations executed.
    Completed,
    /// Best fitness reached the configured goal (or a scape/operator
    /// reported the goal).
    GoalReached,
    /// The cumulative-evaluation limit was exceeded.
    EvaluationBudget,
    /// A `Stop` command arrived.
    Stopped,
    /// The parent cancellation token fired.
    Cancelled,
}

/// Monitor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Initialising,
    Running,
    Paused,
    Terminated(TerminationReason),
}

/// Everything a finished run hands back to the caller. The same data has
/// already been pushed through the storage collaborator.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: RunId,
    pub termination: TerminationReason,
    pub generations_executed: usize,
    pub best_by_generation: Vec<f32>,
    pub best: Option<ScoredGenome>,
    pub final_population: Vec<ScoredGenome>,
    pub species: SpeciesHistory,
    pub lineage: Vec<LineageRecord>,
    pub diagnostics: Vec<GenerationDiagnostics>,
    pub cumulative_evaluations: usize,
}

impl RunResult {
    pub fn final_best_fitness(&self) -> Option<f32> {
        self.best.as_ref().map(|scored| scored.fitness)
    }
}
