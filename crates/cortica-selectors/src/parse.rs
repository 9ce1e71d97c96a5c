use crate::{
    EfficiencySelector, EliteSelector, RandomSelector, RankSelector, SharedTournamentSelector,
    SpeciesTournamentSelector, TopKSelector, TournamentSelector,
};
use cortica_core::{CorticaResult, Select, cortica_err};
use std::sync::Arc;

const DEFAULT_TOURNAMENT_SIZE: usize = 3;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_STAGNATION_LIMIT: usize = 15;

/// Resolve a selector by configuration name.
///
/// `hof_*` names are hall-of-fame aliases from older configurations and
/// map onto the plain selector of the same name.
pub fn parse_selector(name: &str) -> CorticaResult<Arc<dyn Select>> {
    let name = name.strip_prefix("hof_").unwrap_or(name);

    match name {
        "elite" => Ok(Arc::new(EliteSelector::new())),
        "tournament" => Ok(Arc::new(TournamentSelector::new(DEFAULT_TOURNAMENT_SIZE))),
        "species_tournament" => Ok(Arc::new(SpeciesTournamentSelector::new(
            DEFAULT_TOURNAMENT_SIZE,
        ))),
        "shared_tournament" => Ok(Arc::new(SharedTournamentSelector::new(
            DEFAULT_TOURNAMENT_SIZE,
            DEFAULT_STAGNATION_LIMIT,
        ))),
        "rank" => Ok(Arc::new(RankSelector::new())),
        "top_k" => Ok(Arc::new(TopKSelector::new(DEFAULT_TOP_K))),
        "efficiency" => Ok(Arc::new(EfficiencySelector::new())),
        "random" => Ok(Arc::new(RandomSelector::new())),
        other => Err(cortica_err!(InvalidConfig: "unknown selector {:?}", other)),
    }
}
