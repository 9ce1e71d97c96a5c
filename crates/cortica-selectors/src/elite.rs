use crate::by_fitness_desc;
use cortica_core::{ScoredGenome, Select, SelectionContext};

#[derive(Debug, Default)]
pub struct EliteSelector;

impl EliteSelector {
    pub fn new() -> Self {
        EliteSelector
    }
}

impl Select for EliteSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        _: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        let mut ranked = population.to_vec();
        ranked.sort_by(by_fitness_desc);
        ranked.into_iter().take(count).collect()
    }
}
