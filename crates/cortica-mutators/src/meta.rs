use crate::operator::{MutationContext, MutationOperator, SkipReason};
use cortica_core::{CandidateSelection, Genome, Heredity, TopoCountPolicy, random_provider};

/// Rewire which candidate pool the exoself perturbs from for this genome.
#[derive(Default)]
pub struct MutateTuningSelection;

impl MutationOperator for MutateTuningSelection {
    fn name(&self) -> &'static str {
        "mutate_tuning_selection"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let current = genome.strategy().tuning_selection;
        let options = CandidateSelection::ALL
            .iter()
            .filter(|s| **s != current)
            .copied()
            .collect::<Vec<_>>();

        genome.strategy_mut().tuning_selection = *random_provider::choose(&options);
        Ok(())
    }
}

/// Re-draw the annealing factor from (0, 1].
#[derive(Default)]
pub struct MutateAnnealing;

impl MutationOperator for MutateAnnealing {
    fn name(&self) -> &'static str {
        "mutate_annealing"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        genome.strategy_mut().annealing_factor = random_provider::range(0.05_f32..1.0);
        Ok(())
    }
}

/// Re-draw the per-genome topological-mutation-count policy.
#[derive(Default)]
pub struct MutateTopoPolicy;

impl MutationOperator for MutateTopoPolicy {
    fn name(&self) -> &'static str {
        "mutate_tot_topological_mutations"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let policy = match random_provider::range(0..3usize) {
            0 => TopoCountPolicy::Const(random_provider::range(1..4usize)),
            1 => TopoCountPolicy::NCountLinear {
                m: random_provider::range(0.05_f32..0.5),
                cap: 10,
            },
            _ => TopoCountPolicy::NCountExponential {
                p: random_provider::range(0.3_f32..0.8),
                cap: 10,
            },
        };

        genome.strategy_mut().topo_count_policy = Some(policy);
        Ok(())
    }
}

/// Flip between darwinian and lamarckian inheritance of tuned weights.
#[derive(Default)]
pub struct MutateHeredity;

impl MutationOperator for MutateHeredity {
    fn name(&self) -> &'static str {
        "mutate_heredity_type"
    }

    fn apply(&self, genome: &mut Genome, _: &mut MutationContext<'_>) -> Result<(), SkipReason> {
        let strategy = genome.strategy_mut();
        strategy.heredity = match strategy.heredity {
            Heredity::Darwinian => Heredity::Lamarckian,
            Heredity::Lamarckian => Heredity::Darwinian,
        };
        Ok(())
    }
}
