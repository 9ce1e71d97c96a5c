use cortica_core::{ScoredGenome, Select, SelectionContext, random_provider};
use std::cmp::Ordering;

/// Species-shared tournament with stagnation culling.
///
/// Fitness is shared across species (divided by species size) before the
/// tournament, and species whose best has not improved within the
/// stagnation limit are excluded from the parent pool. The incumbent best
/// genome's species is always retained so a stagnant-but-leading species
/// cannot eliminate itself.
#[derive(Debug, Clone)]
pub struct SharedTournamentSelector {
    num: usize,
    stagnation_limit: usize,
}

impl SharedTournamentSelector {
    pub fn new(num: usize, stagnation_limit: usize) -> Self {
        SharedTournamentSelector {
            num: num.max(1),
            stagnation_limit: stagnation_limit.max(1),
        }
    }
}

impl Select for SharedTournamentSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        ctx: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        if population.is_empty() {
            return Vec::new();
        }

        let keys = population
            .iter()
            .map(|scored| ctx.identifier.key_for(&scored.genome))
            .collect::<Vec<_>>();

        let mut shared = vec![0.0f32; population.len()];
        for idx in 0..population.len() {
            let size = keys.iter().filter(|k| **k == keys[idx]).count();
            shared[idx] = population[idx].fitness / size as f32;
        }

        let best_idx = population
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.fitness.partial_cmp(&b.fitness).unwrap_or(Ordering::Equal))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        let eligible = (0..population.len())
            .filter(|&idx| {
                if idx == best_idx || keys[idx] == keys[best_idx] {
                    return true;
                }

                match ctx.stagnation {
                    Some(stagnation) => stagnation
                        .get(&keys[idx])
                        .map(|s| *s < self.stagnation_limit)
                        .unwrap_or(true),
                    None => true,
                }
            })
            .collect::<Vec<_>>();

        let pool = if eligible.is_empty() {
            // Everything stagnated at once; fall back to the full population.
            (0..population.len()).collect::<Vec<_>>()
        } else {
            eligible
        };

        let mut selected = Vec::with_capacity(count);
        for _ in 0..count {
            let winner = (0..self.num)
                .map(|_| pool[random_provider::range(0..pool.len())])
                .max_by(|a, b| shared[*a].partial_cmp(&shared[*b]).unwrap_or(Ordering::Equal))
                .unwrap_or(pool[0]);

            selected.push(population[winner].clone());
        }

        selected
    }
}
