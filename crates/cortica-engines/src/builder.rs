use crate::command::control_channel;
use crate::monitor::Monitor;
use crate::{Controller, MonitorState};
use cortica_core::{
    CancelToken, CorticaError, CorticaResult, FitnessPostprocessor, Genome, IdSource, NullStorage,
    RunId, Scape, Select, SpecieIdentifier, Storage, TopoCountPolicy, cortica_bail, cortica_err,
};
use cortica_mutators::{MutationEngine, OperatorCatalogue};
use cortica_selectors::parse_selector;
use cortica_tuner::{AttemptPolicy, TunerSettings};
use std::sync::Arc;
use tracing::warn;

/// Fully-resolved monitor configuration. Produced by [MonitorBuilder];
/// the monitor itself never re-validates.
pub struct MonitorParams {
    pub run_id: RunId,
    pub scape: Arc<dyn Scape>,
    pub seed_population: Vec<Genome>,
    pub population_size: Option<usize>,
    pub generations: usize,
    pub evaluations_limit: usize,
    pub fitness_goal: f32,
    pub workers: usize,
    pub mutation: MutationEngine,
    pub selector: Arc<dyn Select>,
    pub selector_name: String,
    pub postprocessor: FitnessPostprocessor,
    pub postprocessor_name: String,
    pub identifier: SpecieIdentifier,
    pub tuner: Option<TunerSettings>,
    pub attempt_policy: AttemptPolicy,
    pub survival_percentage: f32,
    pub elite_count: Option<usize>,
    pub specie_size_limit: usize,
    pub steady_state: bool,
    pub trace_step_size: usize,
    pub start_paused: bool,
    pub continue_population_id: Option<RunId>,
    pub storage: Arc<dyn Storage>,
    pub ids: IdSource,
}

/// Error-collecting builder for a [Monitor].
///
/// Invalid settings accumulate and surface together at `build`, so a
/// config file full of mistakes reports all of them in one pass.
pub struct MonitorBuilder {
    run_id: RunId,
    scape: Option<Arc<dyn Scape>>,
    seed_population: Vec<Genome>,
    population_size: Option<usize>,
    seed_shape: Option<(usize, usize, usize)>,
    generations: usize,
    evaluations_limit: usize,
    fitness_goal: f32,
    workers: usize,
    mutation: Option<MutationEngine>,
    selector: Option<Arc<dyn Select>>,
    selector_name: String,
    postprocessor: FitnessPostprocessor,
    postprocessor_name: String,
    identifier: SpecieIdentifier,
    tuner: Option<TunerSettings>,
    attempt_policy: AttemptPolicy,
    survival_percentage: f32,
    elite_count: Option<usize>,
    specie_size_limit: usize,
    steady_state: bool,
    trace_step_size: usize,
    start_paused: bool,
    continue_population_id: Option<RunId>,
    storage: Arc<dyn Storage>,
    ids: IdSource,
    errors: Vec<CorticaError>,
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        MonitorBuilder {
            run_id: RunId(0),
            scape: None,
            seed_population: Vec::new(),
            population_size: None,
            seed_shape: None,
            generations: 10,
            evaluations_limit: 0,
            fitness_goal: 0.0,
            workers: 1,
            mutation: None,
            selector: None,
            selector_name: "elite".into(),
            postprocessor: FitnessPostprocessor::None,
            postprocessor_name: "none".into(),
            identifier: SpecieIdentifier::Topology,
            tuner: None,
            attempt_policy: AttemptPolicy::Fixed,
            survival_percentage: 0.5,
            elite_count: None,
            specie_size_limit: 0,
            steady_state: false,
            trace_step_size: 0,
            start_paused: false,
            continue_population_id: None,
            storage: Arc::new(NullStorage),
            ids: IdSource::new(),
            errors: Vec::new(),
        }
    }
}

impl MonitorBuilder {
    pub fn new() -> Self {
        MonitorBuilder::default()
    }

    fn push_error(&mut self, error: CorticaError) {
        self.errors.push(error);
    }

    pub fn run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn scape(mut self, scape: Arc<dyn Scape>) -> Self {
        self.scape = Some(scape);
        self
    }

    /// Use an explicit seed population.
    pub fn seed_population(mut self, population: Vec<Genome>) -> Self {
        self.seed_population = population;
        self
    }

    /// Seed `size` fully-connected genomes with the given sensor and
    /// actuator counts at build time.
    pub fn seed(mut self, inputs: usize, outputs: usize, size: usize) -> Self {
        self.seed_shape = Some((inputs, outputs, size));
        self
    }

    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    pub fn generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Cumulative-evaluation budget; zero disables the limit.
    pub fn evaluations_limit(mut self, limit: usize) -> Self {
        self.evaluations_limit = limit;
        self
    }

    /// Fitness goal; zero (or below) disables goal termination.
    pub fn fitness_goal(mut self, goal: f32) -> Self {
        if !goal.is_finite() {
            self.push_error(cortica_err!(InvalidConfig: "fitness goal must be finite"));
        }
        self.fitness_goal = goal;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        if workers == 0 {
            self.push_error(cortica_err!(InvalidConfig: "worker count must be >= 1"));
        }
        self.workers = workers.max(1);
        self
    }

    pub fn mutation(mut self, mutation: MutationEngine) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn catalogue(mut self, catalogue: OperatorCatalogue, policy: TopoCountPolicy) -> Self {
        self.mutation = Some(MutationEngine::new(catalogue, policy));
        self
    }

    pub fn selector(mut self, selector: Arc<dyn Select>) -> Self {
        self.selector_name = selector.name().to_string();
        self.selector = Some(selector);
        self
    }

    pub fn selector_name(mut self, name: &str) -> Self {
        match parse_selector(name) {
            Ok(selector) => {
                self.selector = Some(selector);
                self.selector_name = name.to_string();
            }
            Err(err) => self.push_error(err),
        }
        self
    }

    pub fn postprocessor(mut self, postprocessor: FitnessPostprocessor) -> Self {
        self.postprocessor = postprocessor;
        self
    }

    pub fn postprocessor_name(mut self, name: &str) -> Self {
        match FitnessPostprocessor::parse(name) {
            Ok((postprocessor, deprecated)) => {
                if deprecated {
                    warn!(
                        name,
                        "deprecated postprocessor name, prefer \"size_proportional\""
                    );
                }
                self.postprocessor = postprocessor;
                self.postprocessor_name = name.to_string();
            }
            Err(err) => self.push_error(err),
        }
        self
    }

    pub fn identifier(mut self, identifier: SpecieIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn identifier_name(mut self, name: &str) -> Self {
        match name.parse::<SpecieIdentifier>() {
            Ok(identifier) => self.identifier = identifier,
            Err(err) => self.push_error(err),
        }
        self
    }

    pub fn tuner(mut self, settings: TunerSettings) -> Self {
        if settings.annealing_factor <= 0.0 || settings.annealing_factor > 1.0 {
            self.push_error(
                cortica_err!(InvalidConfig: "annealing factor must be in (0, 1], got {}", settings.annealing_factor),
            );
        }
        self.tuner = Some(settings);
        self
    }

    pub fn attempt_policy(mut self, policy: AttemptPolicy) -> Self {
        self.attempt_policy = policy;
        self
    }

    pub fn survival_percentage(mut self, survival: f32) -> Self {
        if !(0.0..=1.0).contains(&survival) || !survival.is_finite() {
            self.push_error(
                cortica_err!(InvalidConfig: "survival percentage must be in [0, 1], got {}", survival),
            );
        }
        self.survival_percentage = survival;
        self
    }

    pub fn elite_count(mut self, count: usize) -> Self {
        self.elite_count = Some(count);
        self
    }

    pub fn specie_size_limit(mut self, limit: usize) -> Self {
        self.specie_size_limit = limit;
        self
    }

    pub fn steady_state(mut self, steady: bool) -> Self {
        self.steady_state = steady;
        self
    }

    /// Steady-state diagnostics cadence in evaluations; zero means one
    /// population's worth.
    pub fn trace_step_size(mut self, step: usize) -> Self {
        self.trace_step_size = step;
        self
    }

    pub fn start_paused(mut self, paused: bool) -> Self {
        self.start_paused = paused;
        self
    }

    pub fn continue_population(mut self, run_id: RunId) -> Self {
        self.continue_population_id = Some(run_id);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn id_source(mut self, ids: IdSource) -> Self {
        self.ids = ids;
        self
    }

    /// Validate and assemble the monitor plus the sending half of its
    /// control channel.
    pub fn build(mut self) -> CorticaResult<(Monitor, Controller)> {
        if self.scape.is_none() {
            self.push_error(cortica_err!(InvalidConfig: "a scape is required"));
        }

        if let Some((inputs, outputs, size)) = self.seed_shape {
            if self.seed_population.is_empty() {
                self.seed_population = (0..size)
                    .map(|_| Genome::seed(inputs, outputs, &mut self.ids))
                    .collect();
            }
        }

        if self.seed_population.is_empty() && self.continue_population_id.is_none() {
            self.push_error(
                cortica_err!(InvalidConfig: "a seed population (or continuation id) is required"),
            );
        }

        if let Some(elites) = self.elite_count {
            let size = self
                .population_size
                .unwrap_or(self.seed_population.len());
            if size > 0 && elites > size {
                self.push_error(
                    cortica_err!(InvalidConfig: "elite count {} exceeds population size {}", elites, size),
                );
            }
        }

        let mutation = match self.mutation.take() {
            Some(mutation) => Some(mutation),
            None => match OperatorCatalogue::standard() {
                Ok(catalogue) => Some(MutationEngine::new(catalogue, TopoCountPolicy::default())),
                Err(err) => {
                    self.push_error(err);
                    None
                }
            },
        };

        let selector = match self.selector.take() {
            Some(selector) => Some(selector),
            None => match parse_selector(&self.selector_name) {
                Ok(selector) => Some(selector),
                Err(err) => {
                    self.push_error(err);
                    None
                }
            },
        };

        if !self.errors.is_empty() {
            let mut message = String::from("monitor configuration rejected:");
            for err in &self.errors {
                message.push_str("\n  - ");
                message.push_str(&err.to_string());
            }
            cortica_bail!(InvalidConfig: "{}", message);
        }

        let (Some(scape), Some(mutation), Some(selector)) = (self.scape.take(), mutation, selector)
        else {
            cortica_bail!(InvalidConfig: "monitor configuration incomplete");
        };

        let params = MonitorParams {
            run_id: self.run_id,
            scape,
            seed_population: self.seed_population,
            population_size: self.population_size,
            generations: self.generations,
            evaluations_limit: self.evaluations_limit,
            fitness_goal: self.fitness_goal,
            workers: self.workers,
            mutation,
            selector,
            selector_name: self.selector_name,
            postprocessor: self.postprocessor,
            postprocessor_name: self.postprocessor_name,
            identifier: self.identifier,
            tuner: self.tuner,
            attempt_policy: self.attempt_policy,
            survival_percentage: self.survival_percentage,
            elite_count: self.elite_count,
            specie_size_limit: self.specie_size_limit,
            steady_state: self.steady_state,
            trace_step_size: self.trace_step_size,
            start_paused: self.start_paused,
            continue_population_id: self.continue_population_id,
            storage: self.storage,
            ids: self.ids,
        };

        let (controller, receiver) = control_channel(params.run_id);
        let state = if params.start_paused {
            MonitorState::Paused
        } else {
            MonitorState::Initialising
        };

        Ok((
            Monitor::new(params, receiver, CancelToken::new(), state),
            controller,
        ))
    }
}
