#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which previously-seen candidate the exoself perturbs next.
///
/// The `*_random` variants draw uniformly where their base variant would
/// draw deterministically; `dynamic` is an alias of `best_so_far` kept for
/// configurations that predate the split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CandidateSelection {
    #[default]
    BestSoFar,
    Original,
    Dynamic,
    DynamicRandom,
    All,
    AllRandom,
    Recent,
    RecentRandom,
    Current,
    CurrentRandom,
    Active,
    ActiveRandom,
    LastGen,
    LastGenRandom,
}

impl CandidateSelection {
    pub const ALL: [CandidateSelection; 14] = [
        CandidateSelection::BestSoFar,
        CandidateSelection::Original,
        CandidateSelection::Dynamic,
        CandidateSelection::DynamicRandom,
        CandidateSelection::All,
        CandidateSelection::AllRandom,
        CandidateSelection::Recent,
        CandidateSelection::RecentRandom,
        CandidateSelection::Current,
        CandidateSelection::CurrentRandom,
        CandidateSelection::Active,
        CandidateSelection::ActiveRandom,
        CandidateSelection::LastGen,
        CandidateSelection::LastGenRandom,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            CandidateSelection::BestSoFar => "best_so_far",
            CandidateSelection::Original => "original",
            CandidateSelection::Dynamic => "dynamic",
            CandidateSelection::DynamicRandom => "dynamic_random",
            CandidateSelection::All => "all",
            CandidateSelection::AllRandom => "all_random",
            CandidateSelection::Recent => "recent",
            CandidateSelection::RecentRandom => "recent_random",
            CandidateSelection::Current => "current",
            CandidateSelection::CurrentRandom => "current_random",
            CandidateSelection::Active => "active",
            CandidateSelection::ActiveRandom => "active_random",
            CandidateSelection::LastGen => "lastgen",
            CandidateSelection::LastGenRandom => "lastgen_random",
        }
    }

    /// Exact tag lookup. Callers that want the lenient normalise-to-default
    /// behavior live in the tuner, which also logs the fall-through.
    pub fn from_tag(tag: &str) -> Option<Self> {
        CandidateSelection::ALL.iter().find(|c| c.tag() == tag).copied()
    }
}

/// How many structural mutations are stacked on a single offspring.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TopoCountPolicy {
    Const(usize),
    NCountLinear { m: f32, cap: i32 },
    NCountExponential { p: f32, cap: i32 },
}

impl TopoCountPolicy {
    /// Structural mutation slots for a genome with `neurons` neurons.
    /// A cap of zero or below disables the ceiling.
    pub fn count(&self, neurons: usize) -> usize {
        match *self {
            TopoCountPolicy::Const(k) => k,
            TopoCountPolicy::NCountLinear { m, cap } => {
                let raw = (m * neurons as f32).round() as usize;
                if cap <= 0 { raw } else { raw.min(cap as usize) }
            }
            TopoCountPolicy::NCountExponential { p, cap } => {
                let raw = (neurons as f32).powf(p).round() as usize;
                if cap <= 0 { raw } else { raw.min(cap as usize) }
            }
        }
    }
}

impl Default for TopoCountPolicy {
    fn default() -> Self {
        TopoCountPolicy::Const(1)
    }
}

/// Whether tuned parameters flow back into the reproducing genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Heredity {
    #[default]
    Darwinian,
    Lamarckian,
}

impl Heredity {
    pub fn tag(&self) -> &'static str {
        match self {
            Heredity::Darwinian => "darwinian",
            Heredity::Lamarckian => "lamarckian",
        }
    }
}

/// Evolvable per-genome strategy parameters. The meta mutation operators
/// rewrite these; the monitor and tuner read them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvoStrategy {
    pub tuning_selection: CandidateSelection,
    pub annealing_factor: f32,
    pub topo_count_policy: Option<TopoCountPolicy>,
    pub heredity: Heredity,
}

impl EvoStrategy {
    pub fn new() -> Self {
        EvoStrategy {
            tuning_selection: CandidateSelection::BestSoFar,
            annealing_factor: 1.0,
            topo_count_policy: None,
            heredity: Heredity::Darwinian,
        }
    }
}

impl Default for EvoStrategy {
    fn default() -> Self {
        Self::new()
    }
}
