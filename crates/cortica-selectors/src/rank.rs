use crate::by_fitness_desc;
use cortica_core::{ScoredGenome, Select, SelectionContext, random_provider};

/// Iterator that repeatedly spins a probability wheel over index
/// probabilities, yielding one index per draw.
pub struct ProbabilityWheelIterator<'a> {
    probabilities: &'a [f32],
    remaining: usize,
}

impl<'a> ProbabilityWheelIterator<'a> {
    pub fn new(probabilities: &'a [f32], count: usize) -> Self {
        ProbabilityWheelIterator {
            probabilities,
            remaining: count,
        }
    }
}

impl Iterator for ProbabilityWheelIterator<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 || self.probabilities.is_empty() {
            return None;
        }
        self.remaining -= 1;

        let mark = random_provider::random::<f32>();
        let mut cumulative = 0.0;
        for (idx, probability) in self.probabilities.iter().enumerate() {
            cumulative += probability;
            if mark < cumulative {
                return Some(idx);
            }
        }

        Some(self.probabilities.len() - 1)
    }
}

// In rank selection the selection probability does not depend directly on
// the fitness, but on the fitness rank of an individual within the
// population. This puts large fitness differences into perspective; the
// exact fitness values themselves do not have to be comparable in scale.
#[derive(Debug, Default)]
pub struct RankSelector;

impl RankSelector {
    pub fn new() -> Self {
        RankSelector
    }
}

impl Select for RankSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        _: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        let n = population.len();
        if n == 0 || count == 0 {
            return Vec::new();
        }

        let mut ranked = population.to_vec();
        ranked.sort_by(by_fitness_desc);

        let rank_sum = (1..=n).map(|i| i as f32).sum::<f32>();
        let mut probabilities = Vec::with_capacity(n);
        for i in 0..n {
            probabilities.push((n as f32 - i as f32) / rank_sum);
        }

        ProbabilityWheelIterator::new(&probabilities, count)
            .map(|i| ranked[i].clone())
            .collect()
    }
}
