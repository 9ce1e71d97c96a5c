mod efficiency;
mod elite;
mod parse;
mod random_selector;
mod rank;
mod shared_tournament;
mod species_tournament;
mod top_k;
mod tournament;

pub use efficiency::EfficiencySelector;
pub use elite::EliteSelector;
pub use parse::parse_selector;
pub use random_selector::RandomSelector;
pub use rank::{ProbabilityWheelIterator, RankSelector};
pub use shared_tournament::SharedTournamentSelector;
pub use species_tournament::SpeciesTournamentSelector;
pub use top_k::TopKSelector;
pub use tournament::TournamentSelector;

use cortica_core::ScoredGenome;
use std::cmp::Ordering;

/// Descending-fitness comparator shared by the rank-style selectors.
/// Fitness is finite by the evaluator's contract, so the fallback never
/// decides between real scores.
pub(crate) fn by_fitness_desc(a: &ScoredGenome, b: &ScoredGenome) -> Ordering {
    b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal)
}
