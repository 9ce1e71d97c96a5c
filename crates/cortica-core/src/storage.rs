use crate::diagnostics::GenerationDiagnostics;
use crate::evaluate::ScoredGenome;
use crate::genome::{Genome, GenomeId};
use crate::lineage::LineageRecord;
use crate::speciate::SpeciesHistory;
use cortica_error::CorticaResult;
use hashbrown::HashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct RunId(pub u64);

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Flat description of a run's configuration, persisted once at run start.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunConfigSummary {
    pub scape: String,
    pub population_size: usize,
    pub generations: usize,
    pub evaluations_limit: usize,
    pub fitness_goal: f32,
    pub workers: usize,
    pub selector: String,
    pub postprocessor: String,
    pub specie_identifier: String,
    pub tuner_enabled: bool,
    pub steady_state: bool,
}

/// Running-best summary for the scape, updated at run end.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScapeSummary {
    pub scape: String,
    pub best_fitness: f32,
    pub evaluations: usize,
}

/// Re-loadable record of a finished (or stopped) population.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PopulationSnapshot {
    pub run_id: RunId,
    pub scape: String,
    pub generations_executed: usize,
    pub population_size: usize,
    pub genome_ids: Vec<GenomeId>,
    pub genomes: Vec<Genome>,
}

/// Everything a run persisted, as one unit. Continuation reads this back to
/// prepend prior history.
#[derive(Debug, Clone, Default)]
pub struct StoredRun {
    pub config: Option<RunConfigSummary>,
    pub best_by_generation: Vec<f32>,
    pub diagnostics: Vec<GenerationDiagnostics>,
    pub species: SpeciesHistory,
    pub lineage: Vec<LineageRecord>,
    pub top: Vec<ScoredGenome>,
    pub scape_summary: Option<ScapeSummary>,
    pub snapshot: Option<PopulationSnapshot>,
}

/// The persistence collaborator. The core calls these hooks from the
/// monitor thread only; implementations decide where the data goes. A
/// returned error is fatal to the run.
pub trait Storage: Send + Sync {
    fn persist_config(&self, run: RunId, config: &RunConfigSummary) -> CorticaResult<()>;

    fn persist_fitness_history(&self, run: RunId, best_by_generation: &[f32]) -> CorticaResult<()>;

    fn persist_diagnostics(&self, run: RunId, rows: &[GenerationDiagnostics]) -> CorticaResult<()>;

    fn persist_species(&self, run: RunId, history: &SpeciesHistory) -> CorticaResult<()>;

    fn persist_lineage(&self, run: RunId, log: &[LineageRecord]) -> CorticaResult<()>;

    fn persist_top(&self, run: RunId, top: &[ScoredGenome]) -> CorticaResult<()>;

    fn persist_scape_summary(&self, run: RunId, summary: &ScapeSummary) -> CorticaResult<()>;

    fn persist_snapshot(&self, snapshot: &PopulationSnapshot) -> CorticaResult<()>;

    /// Load a previously persisted run, keyed by run id. `None` when the
    /// run is unknown.
    fn load_snapshot(&self, run: RunId) -> CorticaResult<Option<StoredRun>>;
}

/// Discards everything. The default collaborator for embedders that only
/// want the in-memory run result.
#[derive(Debug, Default)]
pub struct NullStorage;

impl Storage for NullStorage {
    fn persist_config(&self, _: RunId, _: &RunConfigSummary) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_fitness_history(&self, _: RunId, _: &[f32]) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_diagnostics(&self, _: RunId, _: &[GenerationDiagnostics]) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_species(&self, _: RunId, _: &SpeciesHistory) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_lineage(&self, _: RunId, _: &[LineageRecord]) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_top(&self, _: RunId, _: &[ScoredGenome]) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_scape_summary(&self, _: RunId, _: &ScapeSummary) -> CorticaResult<()> {
        Ok(())
    }

    fn persist_snapshot(&self, _: &PopulationSnapshot) -> CorticaResult<()> {
        Ok(())
    }

    fn load_snapshot(&self, _: RunId) -> CorticaResult<Option<StoredRun>> {
        Ok(None)
    }
}

/// Keeps everything in memory, keyed by run id. Used by tests and by
/// embedders that snapshot/continue runs within one process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    runs: Mutex<HashMap<RunId, StoredRun>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    pub fn get(&self, run: RunId) -> Option<StoredRun> {
        self.runs.lock().unwrap().get(&run).cloned()
    }

    fn update(&self, run: RunId, f: impl FnOnce(&mut StoredRun)) -> CorticaResult<()> {
        let mut runs = self.runs.lock().unwrap();
        f(runs.entry(run).or_default());
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn persist_config(&self, run: RunId, config: &RunConfigSummary) -> CorticaResult<()> {
        self.update(run, |stored| stored.config = Some(config.clone()))
    }

    fn persist_fitness_history(&self, run: RunId, best: &[f32]) -> CorticaResult<()> {
        self.update(run, |stored| stored.best_by_generation = best.to_vec())
    }

    fn persist_diagnostics(&self, run: RunId, rows: &[GenerationDiagnostics]) -> CorticaResult<()> {
        self.update(run, |stored| stored.diagnostics = rows.to_vec())
    }

    fn persist_species(&self, run: RunId, history: &SpeciesHistory) -> CorticaResult<()> {
        self.update(run, |stored| stored.species = history.clone())
    }

    fn persist_lineage(&self, run: RunId, log: &[LineageRecord]) -> CorticaResult<()> {
        self.update(run, |stored| stored.lineage = log.to_vec())
    }

    fn persist_top(&self, run: RunId, top: &[ScoredGenome]) -> CorticaResult<()> {
        self.update(run, |stored| stored.top = top.to_vec())
    }

    fn persist_scape_summary(&self, run: RunId, summary: &ScapeSummary) -> CorticaResult<()> {
        self.update(run, |stored| stored.scape_summary = Some(summary.clone()))
    }

    fn persist_snapshot(&self, snapshot: &PopulationSnapshot) -> CorticaResult<()> {
        self.update(snapshot.run_id, |stored| {
            stored.snapshot = Some(snapshot.clone())
        })
    }

    fn load_snapshot(&self, run: RunId) -> CorticaResult<Option<StoredRun>> {
        Ok(self.get(run))
    }
}
