use crate::genome::{GenomeId, TopologySummary};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Lineage tag used when an offspring survives the retry budget untouched.
pub const NO_OP: &str = "no_op";

/// Append-only record of how one genome was produced from another.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineageRecord {
    pub child: GenomeId,
    pub parents: SmallVec<[GenomeId; 2]>,
    pub generation: usize,
    /// Operation tag, e.g. `mutate_weights` or `add_neuron`.
    pub operation: String,
    /// Topology fingerprint of the child after the operation.
    pub fingerprint: String,
    pub summary: TopologySummary,
}

impl LineageRecord {
    pub fn new(
        child: GenomeId,
        parent: GenomeId,
        generation: usize,
        operation: impl Into<String>,
        fingerprint: String,
        summary: TopologySummary,
    ) -> Self {
        let mut parents = SmallVec::new();
        parents.push(parent);

        LineageRecord {
            child,
            parents,
            generation,
            operation: operation.into(),
            fingerprint,
            summary,
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(
            self.operation.as_str(),
            NO_OP
                | "mutate_weights"
                | "mutate_bias"
                | "remove_bias"
                | "mutate_af"
                | "mutate_aggrf"
                | "mutate_plasticity_parameters"
                | "mutate_pf"
                | "mutate_substrate_parameters"
                | "mutate_tuning_selection"
                | "mutate_annealing"
                | "mutate_tot_topological_mutations"
                | "mutate_heredity_type"
        )
    }
}
