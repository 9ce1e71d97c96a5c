#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Aggregated exoself counters for one generation (or one steady-state
/// trace window).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TunerCounters {
    pub invocations: usize,
    pub attempts: usize,
    pub evaluations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub goal_hits: usize,
}

impl TunerCounters {
    pub fn accept_rate(&self) -> f32 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.accepted as f32 / self.evaluations as f32
        }
    }

    pub fn evals_per_attempt(&self) -> f32 {
        if self.attempts == 0 {
            0.0
        } else {
            self.evaluations as f32 / self.attempts as f32
        }
    }

    pub fn merge(&mut self, other: &TunerCounters) {
        self.invocations += other.invocations;
        self.attempts += other.attempts;
        self.evaluations += other.evaluations;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.goal_hits += other.goal_hits;
    }
}

/// One row of per-generation diagnostics, emitted in generation order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerationDiagnostics {
    pub generation: usize,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    pub min_fitness: f32,
    pub species_count: usize,
    pub fingerprint_diversity: usize,
    /// Present only for adaptive-threshold speciation; key-based
    /// identifiers have no threshold.
    pub speciation_threshold: Option<f32>,
    pub mean_species_size: f32,
    pub largest_species_size: usize,
    pub tuner: TunerCounters,
    pub tuner_accept_rate: f32,
    pub tuner_evals_per_attempt: f32,
    pub cumulative_evaluations: usize,
}

impl GenerationDiagnostics {
    pub fn derive_rates(mut self) -> Self {
        self.tuner_accept_rate = self.tuner.accept_rate();
        self.tuner_evals_per_attempt = self.tuner.evals_per_attempt();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_guard_against_zero() {
        let counters = TunerCounters::default();
        assert_eq!(counters.accept_rate(), 0.0);
        assert_eq!(counters.evals_per_attempt(), 0.0);
    }

    #[test]
    fn merge_accumulates() {
        let mut total = TunerCounters::default();
        total.merge(&TunerCounters {
            invocations: 1,
            attempts: 4,
            evaluations: 4,
            accepted: 1,
            rejected: 3,
            goal_hits: 0,
        });
        total.merge(&TunerCounters {
            invocations: 1,
            attempts: 2,
            evaluations: 2,
            accepted: 2,
            rejected: 0,
            goal_hits: 1,
        });

        assert_eq!(total.invocations, 2);
        assert_eq!(total.attempts, 6);
        assert_eq!(total.accepted, 3);
        assert_eq!(total.goal_hits, 1);
        assert!((total.accept_rate() - 0.5).abs() < 1e-6);
    }
}
