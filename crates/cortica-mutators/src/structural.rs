use crate::operator::{MutationContext, MutationOperator, SkipReason};
use cortica_core::{
    Activation, Genome, Neuron, NeuronId, PARAM_CAP, Substrate, SubstrateNode, SubstrateOp,
    Synapse, random_provider,
};

fn random_weight() -> f32 {
    (random_provider::gaussian(0.0, 1.0) as f32).clamp(-PARAM_CAP, PARAM_CAP)
}

fn non_sensor_ids(genome: &Genome) -> Vec<NeuronId> {
    genome
        .neurons()
        .iter()
        .map(|n| n.id)
        .filter(|id| !genome.sensors().contains(id))
        .collect()
}

fn all_ids(genome: &Genome) -> Vec<NeuronId> {
    genome.neurons().iter().map(|n| n.id).collect()
}

/// Apply `edit` to a scratch clone and commit it only when every actuator
/// stays reachable. This is the orphan guard for removals.
fn guarded_edit(
    genome: &mut Genome,
    edit: impl Fn(&mut Genome) -> bool,
) -> Result<(), SkipReason> {
    let mut scratch = genome.clone();
    if !edit(&mut scratch) {
        return Err(SkipReason::NoApplicableSite);
    }

    if !scratch.actuators_reachable() {
        return Err(SkipReason::NoApplicableSite);
    }

    *genome = scratch;
    Ok(())
}

/// Add a synapse from the perspective of a target neuron: pick a random
/// non-sensor target, then a source it is not already fed by.
#[derive(Default)]
pub struct AddInlink;

impl MutationOperator for AddInlink {
    fn name(&self) -> &'static str {
        "add_inlink"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, ctx: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let mut targets = non_sensor_ids(genome);
        random_provider::shuffle(&mut targets);

        for target in targets {
            let sources = all_ids(genome)
                .into_iter()
                .filter(|source| !genome.has_enabled_synapse(*source, target))
                .collect::<Vec<_>>();

            if !sources.is_empty() {
                let source = *random_provider::choose(&sources);
                genome.push_synapse(Synapse::new(
                    ctx.ids.synapse_id(),
                    source,
                    target,
                    random_weight(),
                ));
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Add a synapse from the perspective of a source neuron: pick a random
/// source, then a non-sensor neuron it does not already feed.
#[derive(Default)]
pub struct AddOutlink;

impl MutationOperator for AddOutlink {
    fn name(&self) -> &'static str {
        "add_outlink"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, ctx: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let mut sources = all_ids(genome);
        random_provider::shuffle(&mut sources);

        for source in sources {
            let targets = non_sensor_ids(genome)
                .into_iter()
                .filter(|target| !genome.has_enabled_synapse(source, *target))
                .collect::<Vec<_>>();

            if !targets.is_empty() {
                let target = *random_provider::choose(&targets);
                genome.push_synapse(Synapse::new(
                    ctx.ids.synapse_id(),
                    source,
                    target,
                    random_weight(),
                ));
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Delete a synapse whose removal leaves every actuator reachable.
#[derive(Default)]
pub struct RemoveSynapse;

impl MutationOperator for RemoveSynapse {
    fn name(&self) -> &'static str {
        "remove_synapse"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let mut candidates = genome.synapses().iter().map(|s| s.id).collect::<Vec<_>>();
        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }
        random_provider::shuffle(&mut candidates);

        for id in candidates {
            if guarded_edit(genome, |g| g.remove_synapse(id)).is_ok() {
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Add a hidden neuron wired between two randomly chosen neurons.
#[derive(Default)]
pub struct AddNeuron;

impl MutationOperator for AddNeuron {
    fn name(&self) -> &'static str {
        "add_neuron"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, ctx: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let targets = non_sensor_ids(genome);
        if targets.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let source = *random_provider::choose(&all_ids(genome));
        let target = *random_provider::choose(&targets);

        let id = ctx.ids.neuron_id();
        let activation = *random_provider::choose(&Activation::ALL);
        genome.push_neuron(Neuron::new(id, activation));
        genome.push_synapse(Synapse::new(ctx.ids.synapse_id(), source, id, random_weight()));
        genome.push_synapse(Synapse::new(ctx.ids.synapse_id(), id, target, random_weight()));
        Ok(())
    }
}

/// Split an enabled synapse: disable it and route through a fresh neuron.
/// The incoming half gets weight 1.0 and the outgoing half keeps the old
/// weight, so the expressed function is initially near-unchanged.
#[derive(Default)]
pub struct SpliceNeuron;

impl MutationOperator for SpliceNeuron {
    fn name(&self) -> &'static str {
        "splice_neuron"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, ctx: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let enabled = genome
            .synapses()
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.id, s.from, s.to, s.weight))
            .collect::<Vec<_>>();

        if enabled.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let (id, from, to, weight) = *random_provider::choose(&enabled);
        if let Some(synapse) = genome.synapse_mut(id) {
            synapse.enabled = false;
        }

        let neuron_id = ctx.ids.neuron_id();
        let activation = *random_provider::choose(&Activation::ALL);
        genome.push_neuron(Neuron::new(neuron_id, activation));
        genome.push_synapse(Synapse::new(ctx.ids.synapse_id(), from, neuron_id, 1.0));
        genome.push_synapse(Synapse::new(ctx.ids.synapse_id(), neuron_id, to, weight));
        Ok(())
    }
}

/// Remove a hidden neuron (and its synapses) without cutting any actuator
/// off from the sensors.
#[derive(Default)]
pub struct RemoveNeuron;

impl MutationOperator for RemoveNeuron {
    fn name(&self) -> &'static str {
        "remove_neuron"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let mut candidates = genome.hidden_neuron_ids();
        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }
        random_provider::shuffle(&mut candidates);

        for id in candidates {
            if guarded_edit(genome, |g| g.remove_neuron(id)).is_ok() {
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Grow a fresh input channel: a linear sensor neuron feeding one existing
/// non-sensor neuron.
#[derive(Default)]
pub struct AddSensor;

impl MutationOperator for AddSensor {
    fn name(&self) -> &'static str {
        "add_sensor"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, ctx: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let targets = non_sensor_ids(genome);
        if targets.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let target = *random_provider::choose(&targets);
        let id = ctx.ids.neuron_id();
        genome.push_neuron(Neuron::new(id, Activation::Linear));
        genome.bind_sensor(id);
        genome.push_synapse(Synapse::new(ctx.ids.synapse_id(), id, target, random_weight()));
        Ok(())
    }
}

/// Retire an input channel. The last sensor is never removed, and the
/// remaining sensors must still reach every actuator.
#[derive(Default)]
pub struct RemoveSensor;

impl MutationOperator for RemoveSensor {
    fn name(&self) -> &'static str {
        "remove_sensor"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        if genome.sensors().len() <= 1 {
            return Err(SkipReason::NoApplicableSite);
        }

        let mut candidates = genome.sensors().to_vec();
        random_provider::shuffle(&mut candidates);

        for id in candidates {
            let committed = guarded_edit(genome, |g| {
                g.unbind_sensor(id);
                g.remove_neuron(id)
            });
            if committed.is_ok() {
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Grow a fresh output channel fed from a sensor-reachable neuron.
#[derive(Default)]
pub struct AddActuator;

impl MutationOperator for AddActuator {
    fn name(&self) -> &'static str {
        "add_actuator"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, ctx: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let mut sources = all_ids(genome);
        random_provider::shuffle(&mut sources);

        let id = ctx.ids.neuron_id();
        for source in sources {
            let synapse_id = ctx.ids.synapse_id();
            let weight = random_weight();
            let committed = guarded_edit(genome, |g| {
                g.push_neuron(Neuron::new(id, Activation::Tanh));
                g.bind_actuator(id);
                g.push_synapse(Synapse::new(synapse_id, source, id, weight));
                true
            });
            if committed.is_ok() {
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Retire an output channel; the last actuator is never removed.
#[derive(Default)]
pub struct RemoveActuator;

impl MutationOperator for RemoveActuator {
    fn name(&self) -> &'static str {
        "remove_actuator"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        if genome.actuators().len() <= 1 {
            return Err(SkipReason::NoApplicableSite);
        }

        let mut candidates = genome.actuators().to_vec();
        random_provider::shuffle(&mut candidates);

        for id in candidates {
            let committed = guarded_edit(genome, |g| {
                g.unbind_actuator(id);
                g.remove_neuron(id)
            });
            if committed.is_ok() {
                return Ok(());
            }
        }

        Err(SkipReason::NoApplicableSite)
    }
}

/// Which substrate node set an operator edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstrateSide {
    Pattern,
    Expression,
}

/// Add a CPP or CEP node, creating the substrate when the genome had none.
pub struct AddSubstrateNode {
    side: SubstrateSide,
}

impl AddSubstrateNode {
    pub fn new(side: SubstrateSide) -> Self {
        AddSubstrateNode { side }
    }
}

impl MutationOperator for AddSubstrateNode {
    fn name(&self) -> &'static str {
        match self.side {
            SubstrateSide::Pattern => "add_cpp",
            SubstrateSide::Expression => "add_cep",
        }
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let substrate = genome.substrate_mut().get_or_insert_with(Substrate::default);
        match self.side {
            SubstrateSide::Pattern => {
                let op = *random_provider::choose(&SubstrateOp::CPP);
                substrate.cpp_nodes.push(SubstrateNode::new(op));
            }
            SubstrateSide::Expression => {
                let op = *random_provider::choose(&SubstrateOp::CEP);
                substrate.cep_nodes.push(SubstrateNode::new(op));
            }
        }
        Ok(())
    }
}

/// Remove a CPP or CEP node.
pub struct RemoveSubstrateNode {
    side: SubstrateSide,
}

impl RemoveSubstrateNode {
    pub fn new(side: SubstrateSide) -> Self {
        RemoveSubstrateNode { side }
    }
}

impl MutationOperator for RemoveSubstrateNode {
    fn name(&self) -> &'static str {
        match self.side {
            SubstrateSide::Pattern => "remove_cpp",
            SubstrateSide::Expression => "remove_cep",
        }
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let Some(substrate) = genome.substrate_mut().as_mut() else {
            return Err(SkipReason::NoApplicableSite);
        };

        let nodes = match self.side {
            SubstrateSide::Pattern => &mut substrate.cpp_nodes,
            SubstrateSide::Expression => &mut substrate.cep_nodes,
        };

        if nodes.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = random_provider::range(0..nodes.len());
        nodes.remove(idx);
        Ok(())
    }
}

/// Grow one random circuit layer by a node.
#[derive(Default)]
pub struct AddCircuitNode;

impl MutationOperator for AddCircuitNode {
    fn name(&self) -> &'static str {
        "add_circuit_node"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let Some(substrate) = genome.substrate_mut().as_mut() else {
            return Err(SkipReason::NoApplicableSite);
        };

        if substrate.layers.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = random_provider::range(0..substrate.layers.len());
        substrate.layers[idx] += 1;
        Ok(())
    }
}

/// Shrink one random circuit layer by a node; an emptied layer is dropped.
#[derive(Default)]
pub struct RemoveCircuitNode;

impl MutationOperator for RemoveCircuitNode {
    fn name(&self) -> &'static str {
        "remove_circuit_node"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let Some(substrate) = genome.substrate_mut().as_mut() else {
            return Err(SkipReason::NoApplicableSite);
        };

        if substrate.layers.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = random_provider::range(0..substrate.layers.len());
        substrate.layers[idx] -= 1;
        if substrate.layers[idx] == 0 {
            substrate.layers.remove(idx);
        }
        Ok(())
    }
}

/// Append a small fresh circuit layer, creating the substrate if needed.
#[derive(Default)]
pub struct AddCircuitLayer;

impl MutationOperator for AddCircuitLayer {
    fn name(&self) -> &'static str {
        "add_circuit_layer"
    }

    fn is_structural(&self) -> bool {
        true
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let substrate = genome.substrate_mut().get_or_insert_with(Substrate::default);
        substrate.layers.push(random_provider::range(1..4usize));
        Ok(())
    }
}
