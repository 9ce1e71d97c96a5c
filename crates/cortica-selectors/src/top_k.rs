use crate::by_fitness_desc;
use cortica_core::{ScoredGenome, Select, SelectionContext};

/// Keeps only the K best genomes and cycles them until `count` parents are
/// produced.
#[derive(Debug, Clone)]
pub struct TopKSelector {
    k: usize,
}

impl TopKSelector {
    pub fn new(k: usize) -> Self {
        TopKSelector { k: k.max(1) }
    }
}

impl Select for TopKSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        _: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        if population.is_empty() {
            return Vec::new();
        }

        let mut ranked = population.to_vec();
        ranked.sort_by(by_fitness_desc);
        ranked.truncate(self.k);

        ranked.iter().cycle().take(count).cloned().collect()
    }
}
