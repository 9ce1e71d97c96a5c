use crate::report::TuneReport;
use cortica_core::{
    CancelToken, CandidateSelection, CorticaResult, EvalMode, Evaluation, Genome, NetworkAgent,
    PARAM_CAP, random_provider,
};
use tracing::debug;

const RECENT_WINDOW: usize = 10;
const PLASTICITY_CAP: f32 = 1.0;

/// Exoself parameters for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerSettings {
    /// Total candidates to evaluate. Zero disables tuning.
    pub attempts: usize,
    /// Independent parameter perturbations per attempt.
    pub steps: usize,
    /// Baseline perturbation magnitude.
    pub step_size: f32,
    /// Spread multiplier applied per step.
    pub perturbation_range: f32,
    /// Multiplies `step_size` after each attempt; in (0, 1].
    pub annealing_factor: f32,
    /// Fitness gain required to accept a candidate.
    pub min_improvement: f32,
    pub selection: CandidateSelection,
}

impl Default for TunerSettings {
    fn default() -> Self {
        TunerSettings {
            attempts: 8,
            steps: 4,
            step_size: 0.1,
            perturbation_range: 1.0,
            annealing_factor: 1.0,
            min_improvement: 0.0,
            selection: CandidateSelection::BestSoFar,
        }
    }
}

impl TunerSettings {
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_selection(mut self, selection: CandidateSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// The runtime-agent capability surface the exoself drives. The backup /
/// restore pair is scoped per attempt: a snapshot is taken before every
/// candidate application and restored on rejection.
pub trait TunableAgent {
    fn snapshot_genome(&self) -> Genome;
    fn apply_genome(&mut self, genome: &Genome) -> CorticaResult<()>;
    fn backup_weights(&mut self);
    fn restore_weights(&mut self) -> CorticaResult<()>;
    fn reactivate(&mut self, mode: EvalMode);
}

impl TunableAgent for NetworkAgent {
    fn snapshot_genome(&self) -> Genome {
        NetworkAgent::snapshot_genome(self)
    }

    fn apply_genome(&mut self, genome: &Genome) -> CorticaResult<()> {
        NetworkAgent::apply_genome(self, genome)
    }

    fn backup_weights(&mut self) {
        NetworkAgent::backup_weights(self)
    }

    fn restore_weights(&mut self) -> CorticaResult<()> {
        NetworkAgent::restore_weights(self)
    }

    fn reactivate(&mut self, mode: EvalMode) {
        NetworkAgent::reactivate(self, mode)
    }
}

#[derive(Debug, Clone)]
pub struct TuneOutcome {
    pub genome: Genome,
    pub fitness: f32,
    pub report: TuneReport,
}

/// In-place stochastic hill-climber over a single genome's weights, biases
/// and plasticity scalars.
pub struct Exoself<'a> {
    settings: &'a TunerSettings,
    token: &'a CancelToken,
    /// Last generation's accepted pool, for the `lastgen` selections.
    lastgen: &'a [Genome],
}

impl<'a> Exoself<'a> {
    pub fn new(settings: &'a TunerSettings, token: &'a CancelToken) -> Self {
        Exoself {
            settings,
            token,
            lastgen: &[],
        }
    }

    pub fn with_lastgen(mut self, lastgen: &'a [Genome]) -> Self {
        self.lastgen = lastgen;
        self
    }

    /// Hill-climb the agent in place.
    ///
    /// `attempts` arrives pre-resolved through an attempt policy;
    /// `baseline` is the fitness the incumbent genome already holds. Each
    /// attempt perturbs a base candidate, applies it, evaluates, and either
    /// commits it or restores the previous weights. A `goal_reached`
    /// evaluation commits and short-circuits. Cancellation restores the
    /// last accepted state and returns the partial report.
    pub fn tune_runtime<A, F>(
        &self,
        agent: &mut A,
        attempts: usize,
        baseline: f32,
        mode: EvalMode,
        mut evaluate: F,
    ) -> CorticaResult<TuneOutcome>
    where
        A: TunableAgent,
        F: FnMut(EvalMode, &mut A) -> CorticaResult<Evaluation>,
    {
        let original = agent.snapshot_genome();
        let mut best = original.clone();
        let mut best_fitness = baseline;

        let mut report = TuneReport::new(attempts);
        let mut step_size = self.settings.step_size;

        let mut tried: Vec<Genome> = Vec::new();
        let mut accepted_pool: Vec<Genome> = Vec::new();

        for _ in 0..attempts {
            if self.token.is_cancelled() {
                agent.apply_genome(&best)?;
                return Ok(TuneOutcome {
                    genome: best,
                    fitness: best_fitness,
                    report,
                });
            }

            report.attempts_executed += 1;

            let base =
                self.pick_base(&original, &best, &tried, &accepted_pool);
            let mut candidate = base.clone();
            perturb(
                &mut candidate,
                self.settings.steps,
                step_size * self.settings.perturbation_range,
            );

            agent.backup_weights();
            report.candidate_evaluations += 1;

            let evaluation = agent
                .apply_genome(&candidate)
                .and_then(|_| {
                    agent.reactivate(mode);
                    evaluate(mode, agent)
                });

            match evaluation {
                Err(err) if err.is_cancelled() => {
                    agent.apply_genome(&best)?;
                    return Ok(TuneOutcome {
                        genome: best,
                        fitness: best_fitness,
                        report,
                    });
                }
                Err(err) => {
                    // One bad candidate is not fatal to the invocation.
                    debug!(error = %err, "tuner candidate evaluation failed, restoring");
                    report.rejected += 1;
                    agent.restore_weights()?;
                }
                Ok(evaluation) => {
                    if evaluation.goal_reached {
                        report.accepted += 1;
                        report.goal_reached = true;
                        best_fitness = evaluation.fitness.max(best_fitness);
                        best = candidate;
                        break;
                    }

                    if evaluation.fitness >= best_fitness + self.settings.min_improvement {
                        report.accepted += 1;
                        best_fitness = evaluation.fitness;
                        best = candidate.clone();
                        accepted_pool.push(candidate.clone());
                    } else {
                        report.rejected += 1;
                        agent.restore_weights()?;
                    }

                    tried.push(candidate);
                }
            }

            step_size *= self.settings.annealing_factor;
        }

        agent.apply_genome(&best)?;

        Ok(TuneOutcome {
            genome: best,
            fitness: best_fitness,
            report,
        })
    }

    fn pick_base<'g>(
        &self,
        original: &'g Genome,
        best: &'g Genome,
        tried: &'g [Genome],
        accepted: &'g [Genome],
    ) -> &'g Genome
    where
        'a: 'g,
    {
        use CandidateSelection::*;

        match self.settings.selection {
            BestSoFar | Dynamic | DynamicRandom => best,
            Original => original,
            All | AllRandom => pick_or(tried, best),
            Recent | RecentRandom => {
                let start = tried.len().saturating_sub(RECENT_WINDOW);
                pick_or(&tried[start..], best)
            }
            Current | CurrentRandom | Active | ActiveRandom => pick_or(accepted, best),
            LastGen | LastGenRandom => pick_or(self.lastgen, best),
        }
    }
}

fn pick_or<'g>(pool: &'g [Genome], fallback: &'g Genome) -> &'g Genome {
    if pool.is_empty() {
        fallback
    } else {
        random_provider::choose(pool)
    }
}

/// Apply `steps` independent Gaussian perturbations to uniformly chosen
/// parameter slots: enabled synapse weights, non-sensor biases, plasticity
/// scalars.
fn perturb(genome: &mut Genome, steps: usize, magnitude: f32) {
    enum Slot {
        Weight(usize),
        Bias(usize),
        Plasticity(usize, usize),
    }

    let mut slots = Vec::new();
    for (idx, synapse) in genome.synapses().iter().enumerate() {
        if synapse.enabled {
            slots.push(Slot::Weight(idx));
        }
    }

    let sensors = genome.sensors().to_vec();
    for (idx, neuron) in genome.neurons().iter().enumerate() {
        if sensors.contains(&neuron.id) {
            continue;
        }
        slots.push(Slot::Bias(idx));
        if let Some(plasticity) = &neuron.plasticity {
            for p_idx in 0..plasticity.params.len() {
                slots.push(Slot::Plasticity(idx, p_idx));
            }
        }
    }

    if slots.is_empty() {
        return;
    }

    for _ in 0..steps {
        let delta = random_provider::gaussian(0.0, magnitude as f64) as f32;
        match slots[random_provider::range(0..slots.len())] {
            Slot::Weight(idx) => {
                let synapse = &mut genome.synapses_mut()[idx];
                synapse.weight = (synapse.weight + delta).clamp(-PARAM_CAP, PARAM_CAP);
            }
            Slot::Bias(idx) => {
                let neuron = &mut genome.neurons_mut()[idx];
                neuron.bias = (neuron.bias + delta).clamp(-PARAM_CAP, PARAM_CAP);
            }
            Slot::Plasticity(idx, p_idx) => {
                if let Some(plasticity) = genome.neurons_mut()[idx].plasticity.as_mut() {
                    plasticity.params[p_idx] =
                        (plasticity.params[p_idx] + delta).clamp(-PLASTICITY_CAP, PLASTICITY_CAP);
                }
            }
        }
    }
}

/// Pure-form tuner: hill-climb a genome against a plain fitness function
/// with default settings. Zero attempts returns the genome unchanged.
pub fn tune(
    genome: &Genome,
    attempts: usize,
    mut fitness_fn: impl FnMut(&Genome) -> f32,
) -> Genome {
    if attempts == 0 {
        return genome.clone();
    }

    let settings = TunerSettings::default();
    let mut best = genome.clone();
    let mut best_fitness = fitness_fn(&best);
    let mut step_size = settings.step_size;

    for _ in 0..attempts {
        let mut candidate = best.clone();
        perturb(
            &mut candidate,
            settings.steps,
            step_size * settings.perturbation_range,
        );

        let fitness = fitness_fn(&candidate);
        if fitness >= best_fitness + settings.min_improvement && fitness > best_fitness {
            best_fitness = fitness;
            best = candidate;
        }

        step_size *= settings.annealing_factor;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortica_core::{IdSource, cortica_err};

    fn agent_for(weight: f32) -> (NetworkAgent, Genome) {
        let mut ids = IdSource::new();
        let mut genome = random_provider::scoped_seed(71, || Genome::seed(1, 1, &mut ids));
        genome.synapses_mut()[0].weight = weight;
        let agent = NetworkAgent::compile(&genome).unwrap();
        (agent, genome)
    }

    /// Fitness peaks at weight == 1.0.
    fn weight_fitness(genome: &Genome) -> f32 {
        let w = genome.synapses()[0].weight;
        1.0 - (w - 1.0) * (w - 1.0)
    }

    #[test]
    fn pure_tune_improves_or_preserves() {
        let (_, genome) = agent_for(0.0);
        let before = weight_fitness(&genome);

        let tuned = random_provider::scoped_seed(7, || tune(&genome, 32, weight_fitness));

        assert!(weight_fitness(&tuned) >= before);
    }

    #[test]
    fn zero_attempts_is_identity() {
        let (_, genome) = agent_for(0.3);
        let tuned = tune(&genome, 0, weight_fitness);
        assert_eq!(tuned, genome);
    }

    #[test]
    fn runtime_tune_reports_conserve() {
        let (mut agent, _) = agent_for(0.0);
        let settings = TunerSettings::default().with_attempts(6);
        let token = CancelToken::new();

        let outcome = random_provider::scoped_seed(11, || {
            Exoself::new(&settings, &token)
                .tune_runtime(&mut agent, 6, -1.0, EvalMode::Tuning, |_, agent| {
                    Ok(Evaluation::new(weight_fitness(&agent.snapshot_genome())))
                })
                .unwrap()
        });

        let report = outcome.report;
        assert_eq!(report.attempts_planned, 6);
        assert!(report.attempts_executed <= report.attempts_planned);
        assert!(report.accepted + report.rejected <= report.candidate_evaluations);
        assert!(report.candidate_evaluations <= report.attempts_planned);
        assert!(outcome.fitness >= -1.0);
    }

    #[test]
    fn goal_reached_short_circuits() {
        let (mut agent, _) = agent_for(0.0);
        let settings = TunerSettings::default().with_attempts(50);
        let token = CancelToken::new();

        let outcome = Exoself::new(&settings, &token)
            .tune_runtime(&mut agent, 50, 0.0, EvalMode::Tuning, |_, _| {
                Ok(Evaluation::new(1.0).goal())
            })
            .unwrap();

        assert!(outcome.report.goal_reached);
        assert_eq!(outcome.report.attempts_executed, 1);
        assert_eq!(outcome.report.accepted, 1);
    }

    #[test]
    fn cancellation_returns_partial_report() {
        let (mut agent, _) = agent_for(0.0);
        let settings = TunerSettings::default().with_attempts(10);
        let token = CancelToken::new();

        let mut calls = 0usize;
        let cancel_after = 3usize;
        let inner = token.clone();

        let outcome = Exoself::new(&settings, &token)
            .tune_runtime(&mut agent, 10, 0.0, EvalMode::Tuning, move |_, _| {
                calls += 1;
                if calls >= cancel_after {
                    inner.cancel();
                }
                Ok(Evaluation::new(0.0))
            })
            .unwrap();

        assert!(outcome.report.attempts_executed <= cancel_after + 1);
        assert!(outcome.report.attempts_executed < 10);
    }

    #[test]
    fn failed_candidate_evaluation_is_non_fatal() {
        let (mut agent, _) = agent_for(0.0);
        let settings = TunerSettings::default().with_attempts(4);
        let token = CancelToken::new();

        let mut calls = 0usize;
        let outcome = Exoself::new(&settings, &token)
            .tune_runtime(&mut agent, 4, 0.0, EvalMode::Tuning, move |_, _| {
                calls += 1;
                if calls % 2 == 0 {
                    Err(cortica_err!(Evaluation: "flaky episode"))
                } else {
                    Ok(Evaluation::new(0.1))
                }
            })
            .unwrap();

        assert_eq!(outcome.report.attempts_executed, 4);
        assert!(outcome.report.rejected >= 2);
    }

    #[test]
    fn tuner_never_regresses_the_returned_best() {
        let (mut agent, _) = agent_for(0.9);
        let settings = TunerSettings::default().with_attempts(16);
        let token = CancelToken::new();
        let baseline = weight_fitness(&agent.snapshot_genome());

        let outcome = random_provider::scoped_seed(13, || {
            Exoself::new(&settings, &token)
                .tune_runtime(&mut agent, 16, baseline, EvalMode::Tuning, |_, agent| {
                    Ok(Evaluation::new(weight_fitness(&agent.snapshot_genome())))
                })
                .unwrap()
        });

        assert!(outcome.fitness >= baseline);
        assert_eq!(
            weight_fitness(&outcome.genome).max(outcome.fitness),
            outcome.fitness
        );
    }
}
