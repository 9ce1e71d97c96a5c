use crate::evaluate::ScoredGenome;
use crate::speciate::{GenerationSpecies, SpecieIdentifier, SpecieKey};
use hashbrown::HashMap;

/// Per-generation context handed to selectors. Species-aware selectors read
/// the current generation record and the stagnation counters; the rest
/// ignore it.
pub struct SelectionContext<'a> {
    pub identifier: &'a SpecieIdentifier,
    pub species: Option<&'a GenerationSpecies>,
    pub stagnation: Option<&'a HashMap<SpecieKey, usize>>,
}

impl<'a> SelectionContext<'a> {
    pub fn new(
        identifier: &'a SpecieIdentifier,
        species: Option<&'a GenerationSpecies>,
        stagnation: Option<&'a HashMap<SpecieKey, usize>>,
    ) -> Self {
        SelectionContext {
            identifier,
            species,
            stagnation,
        }
    }

    pub fn bare(identifier: &'a SpecieIdentifier) -> Self {
        SelectionContext {
            identifier,
            species: None,
            stagnation: None,
        }
    }
}

/// A trait for parent-selection algorithms. Selection picks `count` genomes
/// from an evaluated population to reproduce from; the population arrives
/// with post-processed fitness already applied.
pub trait Select: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
            .split("<")
            .next()
            .unwrap_or(std::any::type_name::<Self>())
            .split("::")
            .last()
            .unwrap_or("Unknown Selector")
    }

    fn select(
        &self,
        population: &[ScoredGenome],
        ctx: &SelectionContext<'_>,
        count: usize,
    ) -> Vec<ScoredGenome>;
}
