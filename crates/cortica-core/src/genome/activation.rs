use cortica_error::{CorticaError, cortica_err};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-neuron activation function tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Activation {
    Tanh,
    Sigmoid,
    Relu,
    Linear,
    Gaussian,
    Sin,
    Sign,
    Sqrt,
    Abs,
}

impl Activation {
    pub const ALL: [Activation; 9] = [
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::Relu,
        Activation::Linear,
        Activation::Gaussian,
        Activation::Sin,
        Activation::Sign,
        Activation::Sqrt,
        Activation::Abs,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Relu => "relu",
            Activation::Linear => "linear",
            Activation::Gaussian => "gaussian",
            Activation::Sin => "sin",
            Activation::Sign => "sign",
            Activation::Sqrt => "sqrt",
            Activation::Abs => "abs",
        }
    }

    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
            Activation::Linear => x,
            Activation::Gaussian => (-(x * x)).exp(),
            Activation::Sin => x.sin(),
            Activation::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Activation::Sqrt => x.signum() * x.abs().sqrt(),
            Activation::Abs => x.abs(),
        }
    }
}

impl FromStr for Activation {
    type Err = CorticaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activation::ALL
            .iter()
            .find(|a| a.tag() == s)
            .copied()
            .ok_or_else(|| cortica_err!(InvalidConfig: "unknown activation function {:?}", s))
    }
}

/// Per-neuron input aggregation tag. `DotProduct` is the conventional
/// weighted sum; the rest fold the weighted inputs elementwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Aggregator {
    DotProduct,
    Product,
    Max,
    Min,
    Diff,
}

impl Aggregator {
    pub const ALL: [Aggregator; 5] = [
        Aggregator::DotProduct,
        Aggregator::Product,
        Aggregator::Max,
        Aggregator::Min,
        Aggregator::Diff,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Aggregator::DotProduct => "dot_product",
            Aggregator::Product => "product",
            Aggregator::Max => "max",
            Aggregator::Min => "min",
            Aggregator::Diff => "diff",
        }
    }

    /// Fold the weighted inputs into a single pre-activation value.
    /// An empty input set aggregates to 0.0 regardless of variant.
    #[inline]
    pub fn apply(&self, weighted: impl Iterator<Item = f32>) -> f32 {
        let mut acc: Option<f32> = None;
        for value in weighted {
            acc = Some(match (acc, self) {
                (None, _) => value,
                (Some(a), Aggregator::DotProduct) => a + value,
                (Some(a), Aggregator::Product) => a * value,
                (Some(a), Aggregator::Max) => a.max(value),
                (Some(a), Aggregator::Min) => a.min(value),
                (Some(a), Aggregator::Diff) => a - value,
            });
        }
        acc.unwrap_or(0.0)
    }
}

impl FromStr for Aggregator {
    type Err = CorticaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregator::ALL
            .iter()
            .find(|a| a.tag() == s)
            .copied()
            .ok_or_else(|| cortica_err!(InvalidConfig: "unknown aggregator {:?}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_tags_round_trip() {
        for activation in Activation::ALL {
            assert_eq!(activation.tag().parse::<Activation>().unwrap(), activation);
        }
        assert!("swish".parse::<Activation>().is_err());
    }

    #[test]
    fn aggregator_folds() {
        let inputs = [1.0, 2.0, 3.0];
        assert_eq!(Aggregator::DotProduct.apply(inputs.iter().copied()), 6.0);
        assert_eq!(Aggregator::Product.apply(inputs.iter().copied()), 6.0);
        assert_eq!(Aggregator::Max.apply(inputs.iter().copied()), 3.0);
        assert_eq!(Aggregator::Min.apply(inputs.iter().copied()), 1.0);
        assert_eq!(Aggregator::Diff.apply(inputs.iter().copied()), -4.0);
        assert_eq!(Aggregator::DotProduct.apply(std::iter::empty()), 0.0);
    }

    #[test]
    fn sigmoid_is_bounded() {
        for x in [-10.0, -1.0, 0.0, 1.0, 10.0] {
            let y = Activation::Sigmoid.apply(x);
            assert!((0.0..=1.0).contains(&y));
        }
    }
}
