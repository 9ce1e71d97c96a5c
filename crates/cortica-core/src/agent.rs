use crate::genome::{Genome, NeuronId, PARAM_CAP, PlasticityRule};
use crate::scape::EvalMode;
use cortica_error::{CorticaResult, cortica_bail, ensure};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// One incoming connection of a compiled neuron: source neuron slot, synapse
/// slot in the genome, and whether the edge reads the previous step.
#[derive(Debug, Clone, Copy)]
struct FanIn {
    source: usize,
    synapse: usize,
    recurrent: bool,
}

/// Weight-level snapshot used by the exoself's backup/restore protocol.
#[derive(Debug, Clone)]
pub struct WeightSnapshot {
    weights: Vec<f32>,
    biases: Vec<f32>,
    plasticity: Vec<Vec<f32>>,
}

/// A materialised, executable network compiled from a [Genome].
///
/// Compilation fixes an evaluation order (sensors first, then the remaining
/// neurons in topological order over the forward edges); recurrent synapses
/// read the previous step's activation. Neurons carrying a plasticity rule
/// update their incoming weights locally after each step, on the agent's
/// working genome only.
pub struct NetworkAgent {
    genome: Genome,
    order: Vec<usize>,
    fan_in: Vec<SmallVec<[FanIn; 4]>>,
    sensor_slots: Vec<usize>,
    actuator_slots: Vec<usize>,
    outputs: Vec<f32>,
    prev: Vec<f32>,
    backup: Option<WeightSnapshot>,
}

impl NetworkAgent {
    pub fn compile(genome: &Genome) -> CorticaResult<Self> {
        genome.validate()?;

        let mut genome = genome.clone();
        genome.refresh_recurrent_flags();

        let index: HashMap<NeuronId, usize> = genome
            .neurons()
            .iter()
            .enumerate()
            .map(|(idx, n)| (n.id, idx))
            .collect();

        let n = genome.neurons().len();
        let mut fan_in: Vec<SmallVec<[FanIn; 4]>> = vec![SmallVec::new(); n];
        for (s_idx, synapse) in genome.synapses().iter().enumerate() {
            if !synapse.enabled {
                continue;
            }
            let source = index[&synapse.from];
            let target = index[&synapse.to];
            fan_in[target].push(FanIn {
                source,
                synapse: s_idx,
                recurrent: synapse.recurrent,
            });
        }

        let order = Self::evaluation_order(&genome, &index);

        let sensor_slots = genome.sensors().iter().map(|id| index[id]).collect();
        let actuator_slots = genome.actuators().iter().map(|id| index[id]).collect();

        Ok(NetworkAgent {
            order,
            fan_in,
            sensor_slots,
            actuator_slots,
            outputs: vec![0.0; n],
            prev: vec![0.0; n],
            backup: None,
            genome,
        })
    }

    /// Kahn-style order over forward edges; recurrent edges are ignored so
    /// cycles cannot stall the queue. Sensors lead the order.
    fn evaluation_order(genome: &Genome, index: &HashMap<NeuronId, usize>) -> Vec<usize> {
        let n = genome.neurons().len();
        let mut in_degree = vec![0usize; n];
        let mut forward: Vec<Vec<usize>> = vec![Vec::new(); n];

        for synapse in genome.synapses().iter().filter(|s| s.enabled && !s.recurrent) {
            let from = index[&synapse.from];
            let to = index[&synapse.to];
            forward[from].push(to);
            in_degree[to] += 1;
        }

        let mut queue = std::collections::VecDeque::new();
        for idx in 0..n {
            if in_degree[idx] == 0 {
                queue.push_back(idx);
            }
        }

        let mut order = Vec::with_capacity(n);
        let mut placed = vec![false; n];
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            placed[idx] = true;
            for &next in &forward[idx] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        // Anything left sits on a forward cycle that the recurrent flags
        // missed upstream; append in stable order so execution still covers
        // every neuron.
        for idx in 0..n {
            if !placed[idx] {
                order.push(idx);
            }
        }

        order
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Step the network once. Missing trailing inputs read as 0.0 so scapes
    /// survive sensor-count mutations; extra inputs are ignored.
    pub fn run_step(&mut self, inputs: &[f32]) -> CorticaResult<Vec<f32>> {
        std::mem::swap(&mut self.prev, &mut self.outputs);

        for (position, &slot) in self.sensor_slots.iter().enumerate() {
            self.outputs[slot] = inputs.get(position).copied().unwrap_or(0.0);
        }

        let sensor_set: &[usize] = &self.sensor_slots;
        for &slot in &self.order {
            if sensor_set.contains(&slot) {
                continue;
            }

            let neuron = &self.genome.neurons()[slot];
            let aggregated = neuron.aggregator.apply(self.fan_in[slot].iter().map(|fan| {
                let pre = if fan.recurrent {
                    self.prev[fan.source]
                } else {
                    self.outputs[fan.source]
                };
                pre * self.genome.synapses()[fan.synapse].weight
            }));

            let value = neuron.activation.apply(aggregated + neuron.bias);
            ensure!(
                value.is_finite(),
                Evaluation: "non-finite activation at neuron {:?}", neuron.id
            );
            self.outputs[slot] = value;
        }

        self.apply_plasticity();

        Ok(self
            .actuator_slots
            .iter()
            .map(|&slot| self.outputs[slot])
            .collect())
    }

    /// Local weight update for neurons carrying a plasticity rule.
    fn apply_plasticity(&mut self) {
        for &slot in &self.order {
            let Some(plasticity) = self.genome.neurons()[slot].plasticity.clone() else {
                continue;
            };

            let rate = plasticity.rate();
            if rate == 0.0 {
                continue;
            }

            let post = self.outputs[slot];
            for fan in self.fan_in[slot].clone() {
                let pre = if fan.recurrent {
                    self.prev[fan.source]
                } else {
                    self.outputs[fan.source]
                };

                let synapse = &mut self.genome.synapses_mut()[fan.synapse];
                let delta = match plasticity.rule {
                    PlasticityRule::Hebbian => rate * pre * post,
                    PlasticityRule::Oja => rate * post * (pre - post * synapse.weight),
                    PlasticityRule::SelfModulation => {
                        let gain = plasticity.params.get(1).copied().unwrap_or(1.0);
                        rate * gain * pre * post
                    }
                };

                synapse.weight = (synapse.weight + delta).clamp(-PARAM_CAP, PARAM_CAP);
            }
        }
    }

    /// Clear all recurrent state ahead of a fresh episode.
    pub fn reactivate(&mut self, _mode: EvalMode) {
        self.outputs.fill(0.0);
        self.prev.fill(0.0);
    }

    /// The agent's current genome, including any plasticity-driven weight
    /// drift since the last `apply_genome`.
    pub fn snapshot_genome(&self) -> Genome {
        self.genome.clone()
    }

    /// Swap in a genome. Parameter-only changes reuse the compiled
    /// structure; a topology change recompiles.
    pub fn apply_genome(&mut self, genome: &Genome) -> CorticaResult<()> {
        if genome.fingerprint() == self.genome.fingerprint()
            && genome.neurons().len() == self.genome.neurons().len()
            && genome.synapses().len() == self.genome.synapses().len()
        {
            genome.validate()?;
            self.genome = genome.clone();
            self.genome.refresh_recurrent_flags();
            return Ok(());
        }

        *self = NetworkAgent::compile(genome)?;
        Ok(())
    }

    /// Capture the current weights, biases and plasticity scalars.
    pub fn backup_weights(&mut self) {
        self.backup = Some(WeightSnapshot {
            weights: self.genome.synapses().iter().map(|s| s.weight).collect(),
            biases: self.genome.neurons().iter().map(|n| n.bias).collect(),
            plasticity: self
                .genome
                .neurons()
                .iter()
                .map(|n| {
                    n.plasticity
                        .as_ref()
                        .map(|p| p.params.clone())
                        .unwrap_or_default()
                })
                .collect(),
        });
    }

    /// Restore the snapshot taken by the last `backup_weights`. Fails when
    /// no snapshot exists or the topology changed since it was taken.
    pub fn restore_weights(&mut self) -> CorticaResult<()> {
        let Some(snapshot) = self.backup.take() else {
            cortica_bail!(TunerSkip: "restore_weights without a prior backup");
        };

        ensure!(
            snapshot.weights.len() == self.genome.synapses().len()
                && snapshot.biases.len() == self.genome.neurons().len(),
            TunerSkip: "weight snapshot does not match current topology"
        );

        for (synapse, weight) in self.genome.synapses_mut().iter_mut().zip(&snapshot.weights) {
            synapse.weight = *weight;
        }
        for (slot, neuron) in self.genome.neurons_mut().iter_mut().enumerate() {
            neuron.bias = snapshot.biases[slot];
            if let Some(plasticity) = neuron.plasticity.as_mut() {
                plasticity.params = snapshot.plasticity[slot].clone();
            }
        }

        Ok(())
    }
}
