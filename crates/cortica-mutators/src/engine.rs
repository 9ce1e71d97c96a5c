use crate::catalogue::OperatorCatalogue;
use crate::operator::{MutationContext, SkipReason};
use cortica_core::lineage::NO_OP;
use cortica_core::{CorticaResult, Genome, IdSource, LineageRecord, TopoCountPolicy, cortica_bail};

const DEFAULT_RETRY_BUDGET: usize = 8;

/// Produces offspring by stacking weighted-random operators on a cloned
/// parent.
///
/// Per slot the engine draws an operator, and on `NoApplicableSite` draws a
/// different one, bounded by the retry budget. Every accepted operation
/// appends one lineage record; an offspring that accepts nothing is
/// surfaced unchanged under a single `no_op` record. Structural edits
/// refresh the recurrent flags and re-check the genome invariants, and any
/// post-mutation invariant failure aborts the generation.
pub struct MutationEngine {
    catalogue: OperatorCatalogue,
    policy: TopoCountPolicy,
    retry_budget: usize,
}

impl MutationEngine {
    pub fn new(catalogue: OperatorCatalogue, policy: TopoCountPolicy) -> Self {
        MutationEngine {
            catalogue,
            policy,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_retry_budget(mut self, budget: usize) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    pub fn catalogue(&self) -> &OperatorCatalogue {
        &self.catalogue
    }

    /// Clone `parent` and mutate the clone. Returns the offspring plus its
    /// lineage records in application order.
    pub fn breed(
        &self,
        parent: &Genome,
        generation: usize,
        ids: &mut IdSource,
    ) -> CorticaResult<(Genome, Vec<LineageRecord>)> {
        let mut child = parent.clone_with_id(ids);

        // A genome may carry its own evolved count policy; the engine's is
        // the default.
        let policy = child.strategy().topo_count_policy.unwrap_or(self.policy);
        let slots = policy.count(child.neurons().len());

        let mut records = Vec::new();

        for _ in 0..slots {
            for _ in 0..self.retry_budget {
                let operator = self.catalogue.draw();

                let mut scratch = child.clone();
                let mut ids_scratch = ids.clone();
                let mut ctx = MutationContext::new(&mut ids_scratch);

                match operator.apply(&mut scratch, &mut ctx) {
                    Err(SkipReason::NoApplicableSite) => continue,
                    Ok(()) => {
                        if operator.is_structural() {
                            scratch.refresh_recurrent_flags();

                            if !scratch.actuators_reachable() {
                                // Rolled back: the scratch clone is dropped.
                                continue;
                            }
                        }

                        if let Err(err) = scratch.validate() {
                            cortica_bail!(
                                InvariantViolated: "operator {:?} produced a malformed genome: {}",
                                operator.name(), err
                            );
                        }

                        *ids = ids_scratch;
                        child = scratch;
                        records.push(LineageRecord::new(
                            child.id(),
                            parent.id(),
                            generation,
                            operator.name(),
                            child.fingerprint(),
                            child.summary(),
                        ));
                        break;
                    }
                }
            }
        }

        if records.is_empty() {
            records.push(LineageRecord::new(
                child.id(),
                parent.id(),
                generation,
                NO_OP,
                child.fingerprint(),
                child.summary(),
            ));
        }

        Ok((child, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::OperatorCatalogue;
    use crate::parametric::MutateWeights;
    use crate::structural::{AddNeuron, RemoveNeuron};
    use cortica_core::random_provider;

    fn seed_pair() -> (Genome, IdSource) {
        let mut ids = IdSource::new();
        let genome = random_provider::scoped_seed(51, || Genome::seed(2, 1, &mut ids));
        (genome, ids)
    }

    #[test]
    fn breed_emits_one_record_per_accepted_operation() {
        let (parent, mut ids) = seed_pair();
        let catalogue = OperatorCatalogue::builder()
            .weighted(1.0, MutateWeights::default())
            .build()
            .unwrap();
        let engine = MutationEngine::new(catalogue, TopoCountPolicy::Const(3));

        let (child, records) = random_provider::scoped_seed(1, || {
            engine.breed(&parent, 0, &mut ids).unwrap()
        });

        assert_eq!(records.len(), 3);
        assert_ne!(child.id(), parent.id());
        assert!(records.iter().all(|r| r.operation == "mutate_weights"));
        assert!(records.iter().all(|r| r.parents[0] == parent.id()));
        assert!(child.validate().is_ok());
    }

    #[test]
    fn exhausted_retries_surface_a_no_op() {
        let (parent, mut ids) = seed_pair();

        // RemoveNeuron can never apply to a genome with no hidden neurons.
        let catalogue = OperatorCatalogue::builder()
            .weighted(1.0, RemoveNeuron)
            .build()
            .unwrap();
        let engine = MutationEngine::new(catalogue, TopoCountPolicy::Const(1));

        let (child, records) = engine.breed(&parent, 2, &mut ids).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation, NO_OP);
        assert_eq!(records[0].generation, 2);
        assert_eq!(child.fingerprint(), parent.fingerprint());
    }

    #[test]
    fn structural_offspring_stay_consistent() {
        let (parent, mut ids) = seed_pair();
        let catalogue = OperatorCatalogue::builder()
            .weighted(1.0, AddNeuron)
            .build()
            .unwrap();
        let engine = MutationEngine::new(catalogue, TopoCountPolicy::Const(2));

        let (child, records) = random_provider::scoped_seed(9, || {
            engine.breed(&parent, 0, &mut ids).unwrap()
        });

        assert_eq!(child.neurons().len(), parent.neurons().len() + 2);
        assert!(records.iter().all(|r| r.is_structural()));
        assert!(child.actuators_reachable());
        assert!(child.validate().is_ok());

        // Fresh ids must not collide with the parent's.
        let parent_max = parent.neurons().iter().map(|n| n.id.0).max().unwrap();
        assert!(child.neurons().iter().any(|n| n.id.0 > parent_max));
    }

    #[test]
    fn genome_policy_overrides_engine_policy() {
        let (mut parent, mut ids) = seed_pair();
        parent.strategy_mut().topo_count_policy = Some(TopoCountPolicy::Const(2));

        let catalogue = OperatorCatalogue::builder()
            .weighted(1.0, MutateWeights::default())
            .build()
            .unwrap();
        let engine = MutationEngine::new(catalogue, TopoCountPolicy::Const(5));

        let (_, records) = engine.breed(&parent, 0, &mut ids).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn deterministic_under_a_fixed_seed() {
        let (parent, ids) = seed_pair();
        let engine = MutationEngine::new(
            OperatorCatalogue::standard().unwrap(),
            TopoCountPolicy::Const(2),
        );

        let mut ids_a = ids.clone();
        let (child_a, records_a) =
            random_provider::scoped_seed(77, || engine.breed(&parent, 0, &mut ids_a).unwrap());

        let mut ids_b = ids.clone();
        let (child_b, records_b) =
            random_provider::scoped_seed(77, || engine.breed(&parent, 0, &mut ids_b).unwrap());

        assert_eq!(child_a, child_b);
        assert_eq!(records_a, records_b);
    }
}
