use cortica_core::{ScoredGenome, Select, SelectionContext, random_provider};

#[derive(Debug, Clone)]
pub struct TournamentSelector {
    num: usize,
}

impl TournamentSelector {
    pub fn new(num: usize) -> Self {
        TournamentSelector { num: num.max(1) }
    }
}

impl Select for TournamentSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        _: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        if population.is_empty() {
            return Vec::new();
        }

        let mut selected = Vec::with_capacity(count);

        for _ in 0..count {
            let winner = (0..self.num)
                .map(|_| random_provider::range(0..population.len()))
                .max_by(|a, b| {
                    population[*a]
                        .fitness
                        .partial_cmp(&population[*b].fitness)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0);

            selected.push(population[winner].clone());
        }

        selected
    }
}
