use cortica_core::{ScoredGenome, Select, SelectionContext, SpecieKey, random_provider};
use std::cmp::Ordering;

/// Tournament selection scoped to species: each parent comes from a
/// species picked proportionally to its size, then a tournament runs among
/// that species' members. Keeps small species represented instead of
/// letting one large species flood the parent pool.
#[derive(Debug, Clone)]
pub struct SpeciesTournamentSelector {
    num: usize,
}

impl SpeciesTournamentSelector {
    pub fn new(num: usize) -> Self {
        SpeciesTournamentSelector { num: num.max(1) }
    }
}

impl Select for SpeciesTournamentSelector {
    fn select(
        &self,
        population: &[ScoredGenome],
        ctx: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome> {
        if population.is_empty() {
            return Vec::new();
        }

        let mut groups: Vec<(SpecieKey, Vec<usize>)> = Vec::new();
        for (idx, scored) in population.iter().enumerate() {
            let key = ctx.identifier.key_for(&scored.genome);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(idx),
                None => groups.push((key, vec![idx])),
            }
        }
        groups.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut selected = Vec::with_capacity(count);
        for _ in 0..count {
            // Size-proportional species pick == a uniform pick over genomes,
            // resolved to the genome's species.
            let anchor = random_provider::range(0..population.len());
            let anchor_key = ctx.identifier.key_for(&population[anchor].genome);
            let members: &[usize] = groups
                .iter()
                .find(|(k, _)| *k == anchor_key)
                .map(|(_, m)| m.as_slice())
                .unwrap_or(&[]);

            let winner = (0..self.num)
                .filter(|_| !members.is_empty())
                .map(|_| members[random_provider::range(0..members.len())])
                .max_by(|a, b| {
                    population[*a]
                        .fitness
                        .partial_cmp(&population[*b].fitness)
                        .unwrap_or(Ordering::Equal)
                })
                .unwrap_or(anchor);

            selected.push(population[winner].clone());
        }

        selected
    }
}
