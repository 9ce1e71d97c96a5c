pub mod agent;
pub mod diagnostics;
pub mod domain;
pub mod evaluate;
pub mod genome;
pub mod lineage;
pub mod scape;
pub mod selector;
pub mod speciate;
pub mod storage;

mod executor;

pub use agent::{NetworkAgent, WeightSnapshot};
pub use diagnostics::{GenerationDiagnostics, TunerCounters};
pub use domain::*;
pub use evaluate::{EvaluatorPool, ScoredGenome};
pub use executor::Executor;
pub use genome::*;
pub use lineage::LineageRecord;
pub use scape::{EvalContext, EvalMode, Evaluation, Scape, Trace};
pub use selector::{Select, SelectionContext};
pub use speciate::{
    FitnessPostprocessor, GenerationSpecies, SpeciationMetrics, SpecieChange, SpecieIdentifier,
    SpecieKey, SpecieRecord, SpeciesDiff, SpeciesHistory, diff, speciate,
};
pub use storage::{
    MemoryStorage, NullStorage, PopulationSnapshot, RunConfigSummary, RunId, ScapeSummary, Storage,
    StoredRun,
};

pub use cortica_error::{CorticaError, CorticaResult, ErrorCode, cortica_bail, cortica_err, ensure};

pub mod prelude {
    pub use super::agent::NetworkAgent;
    pub use super::diagnostics::{GenerationDiagnostics, TunerCounters};
    pub use super::domain::random_provider;
    pub use super::domain::{CancelToken, Tracker};
    pub use super::evaluate::{EvaluatorPool, ScoredGenome};
    pub use super::executor::Executor;
    pub use super::genome::{
        Activation, Aggregator, Genome, GenomeId, Heredity, IdSource, Neuron, NeuronId, Plasticity,
        PlasticityRule, Substrate, Synapse, SynapseId, TopoCountPolicy, TopologySummary,
    };
    pub use super::lineage::LineageRecord;
    pub use super::scape::{EvalContext, EvalMode, Evaluation, Scape};
    pub use super::selector::{Select, SelectionContext};
    pub use super::speciate::{FitnessPostprocessor, SpecieIdentifier, SpeciesHistory};
    pub use super::storage::{RunId, Storage};
    pub use cortica_error::{CorticaError, CorticaResult};
}
