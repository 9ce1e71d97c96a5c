use cortica_error::{CorticaError, cortica_err};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Local learning rule applied to a neuron's incoming weights while the
/// runtime agent steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlasticityRule {
    Hebbian,
    Oja,
    SelfModulation,
}

impl PlasticityRule {
    pub const ALL: [PlasticityRule; 3] = [
        PlasticityRule::Hebbian,
        PlasticityRule::Oja,
        PlasticityRule::SelfModulation,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            PlasticityRule::Hebbian => "hebbian",
            PlasticityRule::Oja => "oja",
            PlasticityRule::SelfModulation => "self_modulation",
        }
    }

    /// Number of rule scalars: hebbian carries a learning rate, oja a
    /// learning rate, self modulation rate + modulation gain.
    pub fn param_count(&self) -> usize {
        match self {
            PlasticityRule::Hebbian | PlasticityRule::Oja => 1,
            PlasticityRule::SelfModulation => 2,
        }
    }

    pub fn default_params(&self) -> Vec<f32> {
        match self {
            PlasticityRule::Hebbian | PlasticityRule::Oja => vec![0.05],
            PlasticityRule::SelfModulation => vec![0.05, 1.0],
        }
    }
}

impl FromStr for PlasticityRule {
    type Err = CorticaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlasticityRule::ALL
            .iter()
            .find(|r| r.tag() == s)
            .copied()
            .ok_or_else(|| cortica_err!(InvalidConfig: "unknown plasticity rule {:?}", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plasticity {
    pub rule: PlasticityRule,
    pub params: Vec<f32>,
}

impl Plasticity {
    pub fn new(rule: PlasticityRule) -> Self {
        Plasticity {
            params: rule.default_params(),
            rule,
        }
    }

    /// Learning rate scalar; every rule stores it at slot 0.
    pub fn rate(&self) -> f32 {
        self.params.first().copied().unwrap_or(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.params.iter().all(|p| p.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_tags_round_trip() {
        for rule in PlasticityRule::ALL {
            assert_eq!(rule.tag().parse::<PlasticityRule>().unwrap(), rule);
        }
    }

    #[test]
    fn default_params_match_arity() {
        for rule in PlasticityRule::ALL {
            assert_eq!(Plasticity::new(rule).params.len(), rule.param_count());
        }
    }
}
