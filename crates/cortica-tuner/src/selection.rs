use cortica_core::CandidateSelection;
use tracing::warn;

/// Resolve a candidate-selection name, normalising anything unrecognised to
/// `best_so_far`.
///
/// Genomes carry their selection tag through the meta mutation operators,
/// so stale or foreign tags can reach the tuner; the fall-through keeps
/// them running but is logged so silent normalisation never hides a typo.
pub fn normalise_selection(name: &str) -> CandidateSelection {
    match CandidateSelection::from_tag(name) {
        Some(selection) => selection,
        None => {
            warn!(
                name,
                fallback = CandidateSelection::BestSoFar.tag(),
                "unknown tuning selection name, normalising"
            );
            CandidateSelection::BestSoFar
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert_eq!(normalise_selection("original"), CandidateSelection::Original);
        assert_eq!(normalise_selection("recent_random"), CandidateSelection::RecentRandom);
        assert_eq!(normalise_selection("lastgen"), CandidateSelection::LastGen);
    }

    #[test]
    fn unknown_names_fall_through_to_best_so_far() {
        assert_eq!(normalise_selection("bestest"), CandidateSelection::BestSoFar);
        assert_eq!(normalise_selection(""), CandidateSelection::BestSoFar);
    }
}
