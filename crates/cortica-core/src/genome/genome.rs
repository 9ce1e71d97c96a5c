use super::{
    Activation, Aggregator, EvoStrategy, GenomeId, IdSource, NeuronId, Plasticity, Substrate,
    SynapseId,
};
use crate::random_provider;
use cortica_error::{CorticaResult, cortica_bail, ensure};
use foldhash::fast::FixedState;
use hashbrown::HashSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::hash::{BuildHasher, Hasher};

/// Weights and biases saturate here; perturbations clamp instead of growing
/// without bound.
pub const PARAM_CAP: f32 = 8.0;

const FINGERPRINT_SEED: u64 = 0x00c0_971c_a5ee_df00;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Neuron {
    pub id: NeuronId,
    pub activation: Activation,
    pub aggregator: Aggregator,
    pub bias: f32,
    pub plasticity: Option<Plasticity>,
}

impl Neuron {
    pub fn new(id: NeuronId, activation: Activation) -> Self {
        Neuron {
            id,
            activation,
            aggregator: Aggregator::DotProduct,
            bias: 0.0,
            plasticity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Synapse {
    pub id: SynapseId,
    pub from: NeuronId,
    pub to: NeuronId,
    pub weight: f32,
    pub enabled: bool,
    pub recurrent: bool,
}

impl Synapse {
    pub fn new(id: SynapseId, from: NeuronId, to: NeuronId, weight: f32) -> Self {
        Synapse {
            id,
            from,
            to,
            weight,
            enabled: true,
            recurrent: false,
        }
    }
}

/// Cheap structural digest used by lineage records and diagnostics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TopologySummary {
    pub neurons: usize,
    pub synapses: usize,
    pub enabled_synapses: usize,
    pub recurrent_synapses: usize,
    pub sensors: usize,
    pub actuators: usize,
    pub activations: Vec<(Activation, usize)>,
    pub aggregators: Vec<(Aggregator, usize)>,
}

/// A directed, possibly recurrent neural network genome.
///
/// Neurons bound to the scape as inputs (`sensors`) or outputs (`actuators`)
/// are protected: structural mutation must never remove them. Neuron and
/// synapse ids are unique within a genome and stable across cloning.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Genome {
    id: GenomeId,
    neurons: Vec<Neuron>,
    synapses: Vec<Synapse>,
    sensors: Vec<NeuronId>,
    actuators: Vec<NeuronId>,
    substrate: Option<Substrate>,
    strategy: EvoStrategy,
}

impl Genome {
    pub fn new(id: GenomeId) -> Self {
        Genome {
            id,
            neurons: Vec::new(),
            synapses: Vec::new(),
            sensors: Vec::new(),
            actuators: Vec::new(),
            substrate: None,
            strategy: EvoStrategy::new(),
        }
    }

    /// Build a minimal fully-connected seed genome: `inputs` linear sensor
    /// neurons, `outputs` tanh actuator neurons, every input wired to every
    /// output with a small random weight.
    pub fn seed(inputs: usize, outputs: usize, ids: &mut IdSource) -> Self {
        let mut genome = Genome::new(ids.genome_id());

        for _ in 0..inputs {
            let id = ids.neuron_id();
            genome.neurons.push(Neuron::new(id, Activation::Linear));
            genome.sensors.push(id);
        }

        for _ in 0..outputs {
            let id = ids.neuron_id();
            genome.neurons.push(Neuron::new(id, Activation::Tanh));
            genome.actuators.push(id);
        }

        for i in 0..inputs {
            for o in 0..outputs {
                let from = genome.sensors[i];
                let to = genome.actuators[o];
                let weight = random_provider::gaussian(0.0, 1.0) as f32;
                genome.synapses.push(Synapse::new(
                    ids.synapse_id(),
                    from,
                    to,
                    weight.clamp(-PARAM_CAP, PARAM_CAP),
                ));
            }
        }

        genome
    }

    pub fn id(&self) -> GenomeId {
        self.id
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    pub fn neurons_mut(&mut self) -> &mut [Neuron] {
        &mut self.neurons
    }

    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }

    pub fn synapses_mut(&mut self) -> &mut [Synapse] {
        &mut self.synapses
    }

    pub fn sensors(&self) -> &[NeuronId] {
        &self.sensors
    }

    pub fn actuators(&self) -> &[NeuronId] {
        &self.actuators
    }

    pub fn substrate(&self) -> Option<&Substrate> {
        self.substrate.as_ref()
    }

    pub fn substrate_mut(&mut self) -> &mut Option<Substrate> {
        &mut self.substrate
    }

    pub fn strategy(&self) -> &EvoStrategy {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut EvoStrategy {
        &mut self.strategy
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neurons.iter().find(|n| n.id == id)
    }

    pub fn neuron_mut(&mut self, id: NeuronId) -> Option<&mut Neuron> {
        self.neurons.iter_mut().find(|n| n.id == id)
    }

    pub fn synapse(&self, id: SynapseId) -> Option<&Synapse> {
        self.synapses.iter().find(|s| s.id == id)
    }

    pub fn synapse_mut(&mut self, id: SynapseId) -> Option<&mut Synapse> {
        self.synapses.iter_mut().find(|s| s.id == id)
    }

    /// Sensor- or actuator-bound neurons may never be removed by structural
    /// mutation.
    pub fn is_protected(&self, id: NeuronId) -> bool {
        self.sensors.contains(&id) || self.actuators.contains(&id)
    }

    pub fn hidden_neuron_ids(&self) -> Vec<NeuronId> {
        self.neurons
            .iter()
            .map(|n| n.id)
            .filter(|id| !self.is_protected(*id))
            .collect()
    }

    pub fn has_enabled_synapse(&self, from: NeuronId, to: NeuronId) -> bool {
        self.synapses
            .iter()
            .any(|s| s.enabled && s.from == from && s.to == to)
    }

    pub fn push_neuron(&mut self, neuron: Neuron) {
        self.neurons.push(neuron);
    }

    pub fn push_synapse(&mut self, synapse: Synapse) {
        self.synapses.push(synapse);
    }

    /// Bind an existing neuron as a sensor (scape input).
    pub fn bind_sensor(&mut self, id: NeuronId) {
        if !self.sensors.contains(&id) {
            self.sensors.push(id);
        }
    }

    /// Bind an existing neuron as an actuator (scape output).
    pub fn bind_actuator(&mut self, id: NeuronId) {
        if !self.actuators.contains(&id) {
            self.actuators.push(id);
        }
    }

    pub fn unbind_sensor(&mut self, id: NeuronId) {
        self.sensors.retain(|s| *s != id);
    }

    pub fn unbind_actuator(&mut self, id: NeuronId) {
        self.actuators.retain(|a| *a != id);
    }

    /// Remove a neuron and every synapse touching it. Refuses protected
    /// neurons; callers unbind first when a sensor or actuator is being
    /// retired wholesale.
    pub fn remove_neuron(&mut self, id: NeuronId) -> bool {
        if self.is_protected(id) || self.neuron(id).is_none() {
            return false;
        }

        self.neurons.retain(|n| n.id != id);
        self.synapses.retain(|s| s.from != id && s.to != id);
        true
    }

    pub fn remove_synapse(&mut self, id: SynapseId) -> bool {
        let before = self.synapses.len();
        self.synapses.retain(|s| s.id != id);
        self.synapses.len() != before
    }

    /// Deep clone under a fresh genome id. Neuron and synapse ids are kept
    /// so structural identity survives reproduction.
    pub fn clone_with_id(&self, ids: &mut IdSource) -> Genome {
        let mut child = self.clone();
        child.id = ids.genome_id();
        child
    }

    /// Check the genome invariants: unique ids, no dangling synapse
    /// endpoints, protected neurons present, all parameters finite.
    pub fn validate(&self) -> CorticaResult<()> {
        let mut neuron_ids = HashSet::with_capacity(self.neurons.len());
        for neuron in &self.neurons {
            ensure!(
                neuron_ids.insert(neuron.id),
                InvalidGenome: "duplicate neuron id {:?} in genome {}", neuron.id, self.id
            );
            ensure!(
                neuron.bias.is_finite(),
                InvalidGenome: "non-finite bias on neuron {:?} in genome {}", neuron.id, self.id
            );
            if let Some(plasticity) = &neuron.plasticity {
                ensure!(
                    plasticity.is_finite(),
                    InvalidGenome: "non-finite plasticity on neuron {:?} in genome {}", neuron.id, self.id
                );
            }
        }

        let mut synapse_ids = HashSet::with_capacity(self.synapses.len());
        for synapse in &self.synapses {
            ensure!(
                synapse_ids.insert(synapse.id),
                InvalidGenome: "duplicate synapse id {:?} in genome {}", synapse.id, self.id
            );
            ensure!(
                neuron_ids.contains(&synapse.from),
                InvalidGenome: "synapse {:?} references missing source {:?}", synapse.id, synapse.from
            );
            ensure!(
                neuron_ids.contains(&synapse.to),
                InvalidGenome: "synapse {:?} references missing target {:?}", synapse.id, synapse.to
            );
            ensure!(
                synapse.weight.is_finite(),
                InvalidGenome: "non-finite weight on synapse {:?} in genome {}", synapse.id, self.id
            );
        }

        for id in self.sensors.iter().chain(self.actuators.iter()) {
            ensure!(
                neuron_ids.contains(id),
                InvalidGenome: "protected neuron {:?} missing from genome {}", id, self.id
            );
        }

        if let Some(substrate) = &self.substrate {
            if !substrate.is_finite() {
                cortica_bail!(InvalidGenome: "non-finite substrate parameter in genome {}", self.id);
            }
        }

        Ok(())
    }

    /// True when every actuator is reachable from some sensor over enabled
    /// synapses. Structural operators use this as their orphan guard.
    pub fn actuators_reachable(&self) -> bool {
        if self.actuators.is_empty() {
            return true;
        }

        let index = self.neuron_index();
        let mut reached = vec![false; self.neurons.len()];
        let mut stack = Vec::new();

        for sensor in &self.sensors {
            if let Some(&idx) = index.get(sensor) {
                if !reached[idx] {
                    reached[idx] = true;
                    stack.push(idx);
                }
            }
        }

        while let Some(current) = stack.pop() {
            let current_id = self.neurons[current].id;
            for synapse in self.synapses.iter().filter(|s| s.enabled) {
                if synapse.from == current_id {
                    if let Some(&next) = index.get(&synapse.to) {
                        if !reached[next] {
                            reached[next] = true;
                            stack.push(next);
                        }
                    }
                }
            }
        }

        self.actuators.iter().all(|actuator| {
            index
                .get(actuator)
                .map(|&idx| reached[idx])
                .unwrap_or(false)
        })
    }

    /// Recompute every synapse's recurrent flag from topological order.
    ///
    /// A depth-first traversal over enabled synapses, rooted at the sensors,
    /// classifies edges into ancestors (back edges, recurrent) and the rest.
    /// Disabled synapses are flagged by comparing the resulting order
    /// positions so a re-enable does not need a second pass.
    pub fn refresh_recurrent_flags(&mut self) {
        let index = self.neuron_index();
        let n = self.neurons.len();
        if n == 0 {
            return;
        }

        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (s_idx, synapse) in self.synapses.iter().enumerate() {
            if !synapse.enabled {
                continue;
            }
            if let (Some(&from), Some(_)) = (index.get(&synapse.from), index.get(&synapse.to)) {
                outgoing[from].push(s_idx);
            }
        }

        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        let mut color = vec![WHITE; n];
        let mut finish_pos = vec![0usize; n];
        let mut next_finish = 0usize;
        let mut back_edges: HashSet<usize> = HashSet::new();

        let roots = self
            .sensors
            .iter()
            .filter_map(|id| index.get(id).copied())
            .chain(0..n)
            .collect::<Vec<usize>>();

        for root in roots {
            if color[root] != WHITE {
                continue;
            }

            // Iterative DFS; (node, next outgoing edge offset).
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            color[root] = GREY;

            while let Some(&(node, edge_offset)) = stack.last() {
                if edge_offset < outgoing[node].len() {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }

                    let s_idx = outgoing[node][edge_offset];
                    let target = index[&self.synapses[s_idx].to];
                    match color[target] {
                        WHITE => {
                            color[target] = GREY;
                            stack.push((target, 0));
                        }
                        GREY => {
                            back_edges.insert(s_idx);
                        }
                        _ => {}
                    }
                } else {
                    color[node] = BLACK;
                    finish_pos[node] = next_finish;
                    next_finish += 1;
                    stack.pop();
                }
            }
        }

        // Reverse finish order is a topological order over the forward edges.
        for (s_idx, synapse) in self.synapses.iter_mut().enumerate() {
            let (Some(&from), Some(&to)) = (index.get(&synapse.from), index.get(&synapse.to))
            else {
                continue;
            };

            synapse.recurrent = if synapse.enabled {
                back_edges.contains(&s_idx) || from == to
            } else {
                from == to || finish_pos[from] <= finish_pos[to]
            };
        }
    }

    /// Deterministic canonical topology hash. Sorted neuron ids with their
    /// activation and aggregator tags plus sorted `(from, to, enabled)`
    /// synapse tuples; weights and biases never participate.
    pub fn fingerprint(&self) -> String {
        let mut hasher = FixedState::with_seed(FINGERPRINT_SEED).build_hasher();

        let mut neurons = self
            .neurons
            .iter()
            .map(|n| (n.id, n.activation.tag(), n.aggregator.tag()))
            .collect::<Vec<_>>();
        neurons.sort();

        for (id, activation, aggregator) in neurons {
            hasher.write_u64(id.0);
            hasher.write(activation.as_bytes());
            hasher.write(aggregator.as_bytes());
        }

        for (from, to, enabled) in self.sorted_synapse_tuples() {
            hasher.write_u64(from.0);
            hasher.write_u64(to.0);
            hasher.write_u8(enabled as u8);
        }

        format!("{:016x}", hasher.finish())
    }

    /// The weaker structure-only hash backing the `topology` specie
    /// identifier: neuron ids and synapse endpoint tuples, no function tags.
    pub fn structure_key(&self) -> String {
        let mut hasher = FixedState::with_seed(FINGERPRINT_SEED).build_hasher();

        let mut neuron_ids = self.neurons.iter().map(|n| n.id.0).collect::<Vec<_>>();
        neuron_ids.sort_unstable();
        for id in neuron_ids {
            hasher.write_u64(id);
        }

        for (from, to, enabled) in self.sorted_synapse_tuples() {
            hasher.write_u64(from.0);
            hasher.write_u64(to.0);
            hasher.write_u8(enabled as u8);
        }

        format!("{:016x}", hasher.finish())
    }

    pub fn summary(&self) -> TopologySummary {
        let mut activations: Vec<(Activation, usize)> = Vec::new();
        let mut aggregators: Vec<(Aggregator, usize)> = Vec::new();

        for neuron in &self.neurons {
            match activations.iter_mut().find(|(a, _)| *a == neuron.activation) {
                Some((_, count)) => *count += 1,
                None => activations.push((neuron.activation, 1)),
            }
            match aggregators.iter_mut().find(|(a, _)| *a == neuron.aggregator) {
                Some((_, count)) => *count += 1,
                None => aggregators.push((neuron.aggregator, 1)),
            }
        }

        activations.sort_by_key(|(a, _)| *a);
        aggregators.sort_by_key(|(a, _)| *a);

        TopologySummary {
            neurons: self.neurons.len(),
            synapses: self.synapses.len(),
            enabled_synapses: self.synapses.iter().filter(|s| s.enabled).count(),
            recurrent_synapses: self.synapses.iter().filter(|s| s.recurrent).count(),
            sensors: self.sensors.len(),
            actuators: self.actuators.len(),
            activations,
            aggregators,
        }
    }

    fn sorted_synapse_tuples(&self) -> Vec<(NeuronId, NeuronId, bool)> {
        let mut tuples = self
            .synapses
            .iter()
            .map(|s| (s.from, s.to, s.enabled))
            .collect::<Vec<_>>();
        tuples.sort();
        tuples
    }

    fn neuron_index(&self) -> hashbrown::HashMap<NeuronId, usize> {
        self.neurons
            .iter()
            .enumerate()
            .map(|(idx, n)| (n.id, idx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(inputs: usize, outputs: usize) -> (Genome, IdSource) {
        let mut ids = IdSource::new();
        let genome = random_provider::scoped_seed(11, || Genome::seed(inputs, outputs, &mut ids));
        (genome, ids)
    }

    #[test]
    fn seed_genome_is_valid() {
        let (genome, _) = seeded(2, 1);
        assert!(genome.validate().is_ok());
        assert_eq!(genome.neurons().len(), 3);
        assert_eq!(genome.synapses().len(), 2);
        assert!(genome.actuators_reachable());
    }

    #[test]
    fn fingerprint_ignores_weights() {
        let (genome, _) = seeded(2, 2);
        let mut perturbed = genome.clone();
        for synapse in perturbed.synapses_mut() {
            synapse.weight += 1.0;
        }
        for neuron in perturbed.neurons_mut() {
            neuron.bias = 0.5;
        }

        assert_eq!(genome.fingerprint(), perturbed.fingerprint());
    }

    #[test]
    fn fingerprint_sees_activation_changes_but_structure_key_does_not() {
        let (genome, _) = seeded(2, 1);
        let mut changed = genome.clone();
        let actuator = changed.actuators()[0];
        changed.neuron_mut(actuator).unwrap().activation = Activation::Sigmoid;

        assert_ne!(genome.fingerprint(), changed.fingerprint());
        assert_eq!(genome.structure_key(), changed.structure_key());
    }

    #[test]
    fn validate_rejects_dangling_synapse() {
        let (mut genome, mut ids) = seeded(1, 1);
        genome.push_synapse(Synapse::new(
            ids.synapse_id(),
            NeuronId(999),
            genome.actuators()[0],
            0.1,
        ));

        let err = genome.validate().unwrap_err();
        assert_eq!(err.code(), cortica_error::ErrorCode::InvalidGenome);
    }

    #[test]
    fn validate_rejects_missing_protected_neuron() {
        let (mut genome, _) = seeded(1, 1);
        let sensor = genome.sensors()[0];
        genome.neurons.retain(|n| n.id != sensor);
        genome.synapses.retain(|s| s.from != sensor && s.to != sensor);

        assert!(genome.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_weight() {
        let (mut genome, _) = seeded(1, 1);
        genome.synapses_mut()[0].weight = f32::NAN;
        assert!(genome.validate().is_err());
    }

    #[test]
    fn protected_neurons_cannot_be_removed() {
        let (mut genome, _) = seeded(1, 1);
        let sensor = genome.sensors()[0];
        assert!(!genome.remove_neuron(sensor));
        assert!(genome.neuron(sensor).is_some());
    }

    #[test]
    fn recurrent_flags_mark_back_edges() {
        let (mut genome, mut ids) = seeded(1, 1);
        let sensor = genome.sensors()[0];
        let actuator = genome.actuators()[0];

        // Hidden neuron in a cycle with the actuator.
        let hidden = ids.neuron_id();
        genome.push_neuron(Neuron::new(hidden, Activation::Tanh));
        genome.push_synapse(Synapse::new(ids.synapse_id(), actuator, hidden, 0.5));
        genome.push_synapse(Synapse::new(ids.synapse_id(), hidden, actuator, 0.5));
        genome.refresh_recurrent_flags();

        let forward = genome
            .synapses()
            .iter()
            .find(|s| s.from == sensor && s.to == actuator)
            .unwrap();
        assert!(!forward.recurrent);

        let recurrent_count = genome.synapses().iter().filter(|s| s.recurrent).count();
        assert_eq!(recurrent_count, 1);
    }

    #[test]
    fn self_loop_is_recurrent() {
        let (mut genome, mut ids) = seeded(1, 1);
        let actuator = genome.actuators()[0];
        genome.push_synapse(Synapse::new(ids.synapse_id(), actuator, actuator, 0.3));
        genome.refresh_recurrent_flags();

        let self_loop = genome
            .synapses()
            .iter()
            .find(|s| s.from == actuator && s.to == actuator)
            .unwrap();
        assert!(self_loop.recurrent);
    }

    #[test]
    fn clone_with_id_keeps_structure() {
        let (genome, mut ids) = seeded(2, 1);
        let child = genome.clone_with_id(&mut ids);

        assert_ne!(child.id(), genome.id());
        assert_eq!(child.fingerprint(), genome.fingerprint());
        assert_eq!(child.neurons().len(), genome.neurons().len());
    }

    #[test]
    fn orphan_guard_detects_cut_actuator() {
        let (mut genome, _) = seeded(1, 1);
        let synapse = genome.synapses()[0].id;
        genome.remove_synapse(synapse);
        assert!(!genome.actuators_reachable());
    }
}
