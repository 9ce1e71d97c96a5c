pub mod activation;
pub mod genome;
pub mod plasticity;
pub mod strategy;
pub mod substrate;

pub use activation::{Activation, Aggregator};
pub use genome::{Genome, Neuron, PARAM_CAP, Synapse, TopologySummary};
pub use plasticity::{Plasticity, PlasticityRule};
pub use strategy::{CandidateSelection, EvoStrategy, Heredity, TopoCountPolicy};
pub use substrate::{Substrate, SubstrateNode, SubstrateOp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct NeuronId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct SynapseId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct GenomeId(pub u64);

impl Display for GenomeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Allocates neuron, synapse and genome ids for one run.
///
/// Ids are never drawn from a process-global counter: two runs seeded
/// identically must allocate identical ids, so each run owns its source and
/// threads it through construction and mutation.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdSource {
    next_neuron: u64,
    next_synapse: u64,
    next_genome: u64,
}

impl IdSource {
    pub fn new() -> Self {
        IdSource::default()
    }

    pub fn neuron_id(&mut self) -> NeuronId {
        let id = NeuronId(self.next_neuron);
        self.next_neuron += 1;
        id
    }

    pub fn synapse_id(&mut self) -> SynapseId {
        let id = SynapseId(self.next_synapse);
        self.next_synapse += 1;
        id
    }

    pub fn genome_id(&mut self) -> GenomeId {
        let id = GenomeId(self.next_genome);
        self.next_genome += 1;
        id
    }

    /// Advance all counters past the ids used by the given genome. Needed
    /// when adopting a population from a snapshot so fresh ids never collide
    /// with restored ones.
    pub fn skip_past(&mut self, genome: &Genome) {
        for neuron in genome.neurons() {
            self.next_neuron = self.next_neuron.max(neuron.id.0 + 1);
        }
        for synapse in genome.synapses() {
            self.next_synapse = self.next_synapse.max(synapse.id.0 + 1);
        }
        self.next_genome = self.next_genome.max(genome.id().0 + 1);
    }
}
