use cortica_core::{ScoredGenome, Select, SelectionContext};
use std::cmp::Ordering;

/// Ranks genomes by fitness per unit of structure, favouring small networks
/// that score well over bloated ones that score slightly better.
#[derive(Debug, Default)]
pub struct EfficiencySelector;

impl EfficiencySelector {
    pub fn new() -> Self {
        EfficiencySelector
    }

    fn efficiency(scored: &ScoredGenome) -> f32 {
        scored.fitness / (1.0 + scored.genome.synapses().len() as f32)
    }
}

impl Select for EfficiencySelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        _: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        let mut ranked = population.to_vec();
        ranked.sort_by(|a, b| {
            Self::efficiency(b)
                .partial_cmp(&Self::efficiency(a))
                .unwrap_or(Ordering::Equal)
        });

        ranked.into_iter().take(count).collect()
    }
}
