use crate::operator::{MutationContext, MutationOperator, SkipReason};
use cortica_core::{
    Activation, Aggregator, Genome, PARAM_CAP, Plasticity, PlasticityRule, random_provider,
};

const PLASTICITY_RATE_CAP: f32 = 1.0;

fn perturbable_neurons(genome: &Genome) -> Vec<usize> {
    let sensors = genome.sensors().to_vec();
    genome
        .neurons()
        .iter()
        .enumerate()
        .filter(|(_, n)| !sensors.contains(&n.id))
        .map(|(idx, _)| idx)
        .collect()
}

/// Gaussian-perturb a random subset of enabled synapse weights. Each weight
/// is selected with probability `1/sqrt(count)`, with at least one always
/// perturbed.
pub struct MutateWeights {
    strength: f32,
}

impl MutateWeights {
    pub fn new(strength: f32) -> Self {
        MutateWeights { strength }
    }
}

impl Default for MutateWeights {
    fn default() -> Self {
        MutateWeights::new(0.5)
    }
}

impl MutationOperator for MutateWeights {
    fn name(&self) -> &'static str {
        "mutate_weights"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let enabled = genome
            .synapses()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.enabled)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        if enabled.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let probability = 1.0 / (enabled.len() as f32).sqrt();
        let mut touched = false;
        for &idx in &enabled {
            if random_provider::bool(probability) {
                let delta = random_provider::gaussian(0.0, self.strength as f64) as f32;
                let synapse = &mut genome.synapses_mut()[idx];
                synapse.weight = (synapse.weight + delta).clamp(-PARAM_CAP, PARAM_CAP);
                touched = true;
            }
        }

        if !touched {
            let idx = *random_provider::choose(&enabled);
            let delta = random_provider::gaussian(0.0, self.strength as f64) as f32;
            let synapse = &mut genome.synapses_mut()[idx];
            synapse.weight = (synapse.weight + delta).clamp(-PARAM_CAP, PARAM_CAP);
        }

        Ok(())
    }
}

/// Gaussian-perturb one random non-sensor bias.
pub struct MutateBias {
    strength: f32,
}

impl MutateBias {
    pub fn new(strength: f32) -> Self {
        MutateBias { strength }
    }
}

impl Default for MutateBias {
    fn default() -> Self {
        MutateBias::new(0.5)
    }
}

impl MutationOperator for MutateBias {
    fn name(&self) -> &'static str {
        "mutate_bias"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let candidates = perturbable_neurons(genome);
        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = *random_provider::choose(&candidates);
        let delta = random_provider::gaussian(0.0, self.strength as f64) as f32;
        let neuron = &mut genome.neurons_mut()[idx];
        neuron.bias = (neuron.bias + delta).clamp(-PARAM_CAP, PARAM_CAP);
        Ok(())
    }
}

/// Zero out one random non-zero bias.
#[derive(Default)]
pub struct RemoveBias;

impl MutationOperator for RemoveBias {
    fn name(&self) -> &'static str {
        "remove_bias"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let candidates = perturbable_neurons(genome)
            .into_iter()
            .filter(|&idx| genome.neurons()[idx].bias != 0.0)
            .collect::<Vec<_>>();

        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = *random_provider::choose(&candidates);
        genome.neurons_mut()[idx].bias = 0.0;
        Ok(())
    }
}

/// Swap one random non-sensor neuron to a different activation function.
#[derive(Default)]
pub struct MutateActivation;

impl MutationOperator for MutateActivation {
    fn name(&self) -> &'static str {
        "mutate_af"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let candidates = perturbable_neurons(genome);
        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = *random_provider::choose(&candidates);
        let current = genome.neurons()[idx].activation;
        let options = Activation::ALL
            .iter()
            .filter(|a| **a != current)
            .copied()
            .collect::<Vec<_>>();

        genome.neurons_mut()[idx].activation = *random_provider::choose(&options);
        Ok(())
    }
}

/// Swap one random non-sensor neuron to a different aggregator.
#[derive(Default)]
pub struct MutateAggregator;

impl MutationOperator for MutateAggregator {
    fn name(&self) -> &'static str {
        "mutate_aggrf"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let candidates = perturbable_neurons(genome);
        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = *random_provider::choose(&candidates);
        let current = genome.neurons()[idx].aggregator;
        let options = Aggregator::ALL
            .iter()
            .filter(|a| **a != current)
            .copied()
            .collect::<Vec<_>>();

        genome.neurons_mut()[idx].aggregator = *random_provider::choose(&options);
        Ok(())
    }
}

/// Gaussian-perturb the rule scalars of one plasticity-carrying neuron.
pub struct MutatePlasticityParams {
    strength: f32,
}

impl MutatePlasticityParams {
    pub fn new(strength: f32) -> Self {
        MutatePlasticityParams { strength }
    }
}

impl Default for MutatePlasticityParams {
    fn default() -> Self {
        MutatePlasticityParams::new(0.1)
    }
}

impl MutationOperator for MutatePlasticityParams {
    fn name(&self) -> &'static str {
        "mutate_plasticity_parameters"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let candidates = genome
            .neurons()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.plasticity.is_some())
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = *random_provider::choose(&candidates);
        let strength = self.strength as f64;
        if let Some(plasticity) = genome.neurons_mut()[idx].plasticity.as_mut() {
            for param in plasticity.params.iter_mut() {
                let delta = random_provider::gaussian(0.0, strength) as f32;
                *param = (*param + delta).clamp(-PLASTICITY_RATE_CAP, PLASTICITY_RATE_CAP);
            }
        }

        Ok(())
    }
}

/// Assign one random non-sensor neuron a different plasticity rule, or a
/// fresh one when the neuron was static.
#[derive(Default)]
pub struct MutatePlasticityRule;

impl MutationOperator for MutatePlasticityRule {
    fn name(&self) -> &'static str {
        "mutate_pf"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let candidates = perturbable_neurons(genome);
        if candidates.is_empty() {
            return Err(SkipReason::NoApplicableSite);
        }

        let idx = *random_provider::choose(&candidates);
        let current = genome.neurons()[idx].plasticity.as_ref().map(|p| p.rule);
        let options = PlasticityRule::ALL
            .iter()
            .filter(|rule| Some(**rule) != current)
            .copied()
            .collect::<Vec<_>>();

        let rule = *random_provider::choose(&options);
        genome.neurons_mut()[idx].plasticity = Some(Plasticity::new(rule));
        Ok(())
    }
}

/// Gaussian-perturb one substrate node's parameters.
pub struct MutateSubstrateParams {
    strength: f32,
}

impl MutateSubstrateParams {
    pub fn new(strength: f32) -> Self {
        MutateSubstrateParams { strength }
    }
}

impl Default for MutateSubstrateParams {
    fn default() -> Self {
        MutateSubstrateParams::new(0.25)
    }
}

impl MutationOperator for MutateSubstrateParams {
    fn name(&self) -> &'static str {
        "mutate_substrate_parameters"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let strength = self.strength as f64;

        let Some(substrate) = genome.substrate_mut().as_mut() else {
            return Err(SkipReason::NoApplicableSite);
        };

        let cpp_count = substrate.cpp_nodes.len();
        let total = cpp_count + substrate.cep_nodes.len();
        if total == 0 {
            return Err(SkipReason::NoApplicableSite);
        }

        let pick = random_provider::range(0..total);
        let node = if pick < cpp_count {
            &mut substrate.cpp_nodes[pick]
        } else {
            &mut substrate.cep_nodes[pick - cpp_count]
        };

        for param in node.params.iter_mut() {
            let delta = random_provider::gaussian(0.0, strength) as f32;
            *param = (*param + delta).clamp(-PARAM_CAP, PARAM_CAP);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortica_core::{IdSource, SubstrateOp, SubstrateNode, Substrate};

    fn ctx_genome() -> (Genome, IdSource) {
        let mut ids = IdSource::new();
        let genome = random_provider::scoped_seed(31, || Genome::seed(2, 1, &mut ids));
        (genome, ids)
    }

    #[test]
    fn mutate_weights_touches_at_least_one_weight() {
        let (mut genome, mut ids) = ctx_genome();
        let before = genome.synapses().iter().map(|s| s.weight).collect::<Vec<_>>();

        random_provider::scoped_seed(1, || {
            MutateWeights::default()
                .apply(&mut genome, &mut MutationContext::new(&mut ids))
                .unwrap();
        });

        let after = genome.synapses().iter().map(|s| s.weight).collect::<Vec<_>>();
        assert_ne!(before, after);
        assert!(after.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn mutate_weights_skips_without_enabled_synapses() {
        let (mut genome, mut ids) = ctx_genome();
        for synapse in genome.synapses_mut() {
            synapse.enabled = false;
        }

        let result = MutateWeights::default().apply(&mut genome, &mut MutationContext::new(&mut ids));
        assert_eq!(result, Err(SkipReason::NoApplicableSite));
    }

    #[test]
    fn remove_bias_requires_a_nonzero_bias() {
        let (mut genome, mut ids) = ctx_genome();
        let result = RemoveBias.apply(&mut genome, &mut MutationContext::new(&mut ids));
        assert_eq!(result, Err(SkipReason::NoApplicableSite));

        let actuator = genome.actuators()[0];
        genome.neuron_mut(actuator).unwrap().bias = 0.7;
        RemoveBias
            .apply(&mut genome, &mut MutationContext::new(&mut ids))
            .unwrap();
        assert_eq!(genome.neuron(actuator).unwrap().bias, 0.0);
    }

    #[test]
    fn mutate_af_never_picks_the_current_function() {
        let (mut genome, mut ids) = ctx_genome();
        let actuator = genome.actuators()[0];
        let before = genome.neuron(actuator).unwrap().activation;

        MutateActivation
            .apply(&mut genome, &mut MutationContext::new(&mut ids))
            .unwrap();

        assert_ne!(genome.neuron(actuator).unwrap().activation, before);
    }

    #[test]
    fn plasticity_rule_assignment_and_param_perturbation() {
        let (mut genome, mut ids) = ctx_genome();

        let result =
            MutatePlasticityParams::default().apply(&mut genome, &mut MutationContext::new(&mut ids));
        assert_eq!(result, Err(SkipReason::NoApplicableSite));

        MutatePlasticityRule
            .apply(&mut genome, &mut MutationContext::new(&mut ids))
            .unwrap();
        assert!(genome.neurons().iter().any(|n| n.plasticity.is_some()));

        MutatePlasticityParams::default()
            .apply(&mut genome, &mut MutationContext::new(&mut ids))
            .unwrap();
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn substrate_params_require_a_substrate() {
        let (mut genome, mut ids) = ctx_genome();
        let result =
            MutateSubstrateParams::default().apply(&mut genome, &mut MutationContext::new(&mut ids));
        assert_eq!(result, Err(SkipReason::NoApplicableSite));

        *genome.substrate_mut() = Some(Substrate {
            cpp_nodes: vec![SubstrateNode::new(SubstrateOp::Cartesian)],
            cep_nodes: Vec::new(),
            layers: Vec::new(),
        });

        MutateSubstrateParams::default()
            .apply(&mut genome, &mut MutationContext::new(&mut ids))
            .unwrap();
        assert!(genome.substrate().unwrap().is_finite());
    }
}
