use crate::meta::{MutateAnnealing, MutateHeredity, MutateTopoPolicy, MutateTuningSelection};
use crate::operator::MutationOperator;
use crate::parametric::{
    MutateActivation, MutateAggregator, MutateBias, MutatePlasticityParams, MutatePlasticityRule,
    MutateSubstrateParams, MutateWeights, RemoveBias,
};
use crate::structural::{
    AddActuator, AddCircuitLayer, AddCircuitNode, AddInlink, AddNeuron, AddOutlink, AddSensor,
    AddSubstrateNode, RemoveActuator, RemoveCircuitNode, RemoveNeuron, RemoveSensor,
    RemoveSubstrateNode, RemoveSynapse, SpliceNeuron, SubstrateSide,
};
use cortica_core::{CorticaResult, cortica_bail, ensure, random_provider};

/// An ordered catalogue of weighted mutation operators.
///
/// Selection draws a uniform value over the weight sum and maps it onto the
/// prefix sums, so an operator's share of offspring equals its share of the
/// total weight. Zero-weight operators are never drawn.
pub struct OperatorCatalogue {
    entries: Vec<(f32, Box<dyn MutationOperator>)>,
    total: f32,
}

impl OperatorCatalogue {
    pub fn builder() -> CatalogueBuilder {
        CatalogueBuilder {
            entries: Vec::new(),
        }
    }

    /// The default operator set with weights that keep parameter tweaks
    /// dominant over topology growth, growth over shrinkage, and the meta
    /// and substrate operators rare.
    pub fn standard() -> CorticaResult<Self> {
        OperatorCatalogue::builder()
            .weighted(4.0, MutateWeights::default())
            .weighted(2.0, MutateBias::default())
            .weighted(0.5, RemoveBias)
            .weighted(1.0, MutateActivation)
            .weighted(0.5, MutateAggregator)
            .weighted(0.5, MutatePlasticityParams::default())
            .weighted(0.25, MutatePlasticityRule)
            .weighted(0.25, MutateSubstrateParams::default())
            .weighted(1.0, AddInlink)
            .weighted(1.0, AddOutlink)
            .weighted(0.5, RemoveSynapse)
            .weighted(1.0, AddNeuron)
            .weighted(0.75, SpliceNeuron)
            .weighted(0.25, RemoveNeuron)
            .weighted(0.1, AddSensor)
            .weighted(0.05, RemoveSensor)
            .weighted(0.1, AddActuator)
            .weighted(0.05, RemoveActuator)
            .weighted(0.1, AddSubstrateNode::new(SubstrateSide::Pattern))
            .weighted(0.05, RemoveSubstrateNode::new(SubstrateSide::Pattern))
            .weighted(0.1, AddSubstrateNode::new(SubstrateSide::Expression))
            .weighted(0.05, RemoveSubstrateNode::new(SubstrateSide::Expression))
            .weighted(0.1, AddCircuitNode)
            .weighted(0.05, RemoveCircuitNode)
            .weighted(0.05, AddCircuitLayer)
            .weighted(0.1, MutateTuningSelection)
            .weighted(0.1, MutateAnnealing)
            .weighted(0.1, MutateTopoPolicy)
            .weighted(0.1, MutateHeredity)
            .build()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw an operator by weighted-random selection.
    pub fn draw(&self) -> &dyn MutationOperator {
        let mark = random_provider::range(0.0_f32..self.total);
        let mut cumulative = 0.0;

        for (weight, operator) in &self.entries {
            cumulative += weight;
            if mark < cumulative {
                return operator.as_ref();
            }
        }

        // Floating-point accumulation can leave `mark` a hair past the last
        // prefix sum; the final positively-weighted operator owns that edge.
        self.entries
            .iter()
            .rev()
            .find(|(weight, _)| *weight > 0.0)
            .map(|(_, operator)| operator.as_ref())
            .unwrap_or_else(|| self.entries[self.entries.len() - 1].1.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(_, op)| op.name()).collect()
    }
}

pub struct CatalogueBuilder {
    entries: Vec<(f32, Box<dyn MutationOperator>)>,
}

impl CatalogueBuilder {
    pub fn weighted(mut self, weight: f32, operator: impl MutationOperator + 'static) -> Self {
        self.entries.push((weight, Box::new(operator)));
        self
    }

    pub fn build(self) -> CorticaResult<OperatorCatalogue> {
        ensure!(
            !self.entries.is_empty(),
            InvalidConfig: "operator catalogue is empty"
        );

        for (weight, operator) in &self.entries {
            if !weight.is_finite() || *weight < 0.0 {
                cortica_bail!(InvalidConfig: "operator {:?} has invalid weight {}", operator.name(), weight);
            }
        }

        let total = self.entries.iter().map(|(w, _)| w).sum::<f32>();
        ensure!(
            total > 0.0,
            InvalidConfig: "operator weights sum to zero; at least one operator must be drawable"
        );

        Ok(OperatorCatalogue {
            entries: self.entries,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortica_core::ErrorCode;

    #[test]
    fn standard_catalogue_builds() {
        let catalogue = OperatorCatalogue::standard().unwrap();
        assert!(catalogue.len() > 20);
        assert!(catalogue.names().contains(&"mutate_weights"));
        assert!(catalogue.names().contains(&"add_neuron"));
        assert!(catalogue.names().contains(&"mutate_heredity_type"));
    }

    #[test]
    fn zero_sum_weights_are_rejected() {
        let err = OperatorCatalogue::builder()
            .weighted(0.0, MutateWeights::default())
            .weighted(0.0, AddNeuron)
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn negative_weights_are_rejected() {
        let err = OperatorCatalogue::builder()
            .weighted(-1.0, MutateWeights::default())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn zero_weight_operators_are_never_drawn() {
        let catalogue = OperatorCatalogue::builder()
            .weighted(0.0, AddNeuron)
            .weighted(1.0, MutateWeights::default())
            .build()
            .unwrap();

        for _ in 0..200 {
            assert_eq!(catalogue.draw().name(), "mutate_weights");
        }
    }

    #[test]
    fn draw_respects_weight_shares() {
        let catalogue = OperatorCatalogue::builder()
            .weighted(9.0, MutateWeights::default())
            .weighted(1.0, AddNeuron)
            .build()
            .unwrap();

        let draws = random_provider::scoped_seed(7, || {
            (0..1000)
                .filter(|_| catalogue.draw().name() == "mutate_weights")
                .count()
        });

        assert!(draws > 800 && draws < 980, "got {draws}");
    }
}
