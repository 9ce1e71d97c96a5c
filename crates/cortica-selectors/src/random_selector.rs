use cortica_core::{ScoredGenome, Select, SelectionContext, random_provider};

#[derive(Debug, Default)]
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        RandomSelector
    }
}

impl Select for RandomSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        _: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        if population.is_empty() {
            return Vec::new();
        }

        (0..count)
            .map(|_| random_provider::choose(population).clone())
            .collect()
    }
}
