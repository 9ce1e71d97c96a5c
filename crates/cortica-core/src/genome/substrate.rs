use cortica_error::{CorticaError, cortica_err};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Operation tag for a substrate node. Connection-pattern-producing (CPP)
/// nodes compute connectivity from coordinates; connection-expression
/// producing (CEP) nodes gate whether a computed connection is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SubstrateOp {
    Cartesian,
    Polar,
    Spherical,
    SetWeight,
    SetExpression,
    Delta,
}

impl SubstrateOp {
    pub const CPP: [SubstrateOp; 3] = [
        SubstrateOp::Cartesian,
        SubstrateOp::Polar,
        SubstrateOp::Spherical,
    ];

    pub const CEP: [SubstrateOp; 3] = [
        SubstrateOp::SetWeight,
        SubstrateOp::SetExpression,
        SubstrateOp::Delta,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            SubstrateOp::Cartesian => "cartesian",
            SubstrateOp::Polar => "polar",
            SubstrateOp::Spherical => "spherical",
            SubstrateOp::SetWeight => "set_weight",
            SubstrateOp::SetExpression => "set_expression",
            SubstrateOp::Delta => "delta",
        }
    }
}

impl FromStr for SubstrateOp {
    type Err = CorticaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubstrateOp::CPP
            .iter()
            .chain(SubstrateOp::CEP.iter())
            .find(|op| op.tag() == s)
            .copied()
            .ok_or_else(|| cortica_err!(InvalidConfig: "unknown substrate op {:?}", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubstrateNode {
    pub op: SubstrateOp,
    pub params: Vec<f32>,
}

impl SubstrateNode {
    pub fn new(op: SubstrateOp) -> Self {
        SubstrateNode {
            op,
            params: vec![0.0; 2],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.params.iter().all(|p| p.is_finite())
    }
}

/// Spatial parameterisation of a genome: CPP/CEP node sets plus the circuit
/// layer layout. Absent for directly-encoded genomes.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Substrate {
    pub cpp_nodes: Vec<SubstrateNode>,
    pub cep_nodes: Vec<SubstrateNode>,
    pub layers: Vec<usize>,
}

impl Substrate {
    pub fn is_empty(&self) -> bool {
        self.cpp_nodes.is_empty() && self.cep_nodes.is_empty() && self.layers.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.cpp_nodes.iter().all(SubstrateNode::is_finite)
            && self.cep_nodes.iter().all(SubstrateNode::is_finite)
    }

    /// Total circuit node count across layers.
    pub fn circuit_nodes(&self) -> usize {
        self.layers.iter().sum()
    }
}
