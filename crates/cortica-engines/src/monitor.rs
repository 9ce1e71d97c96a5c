use crate::builder::MonitorParams;
use crate::command::MonitorCommand;
use crate::result::{MonitorState, RunResult, TerminationReason};
use cortica_core::{
    CancelToken, CorticaResult, EvalContext, EvalMode, EvaluatorPool, GenerationDiagnostics,
    Genome, IdSource, LineageRecord, NetworkAgent, PopulationSnapshot, RunConfigSummary,
    ScapeSummary, ScoredGenome, SelectionContext, SpecieKey, SpeciesHistory, Tracker,
    TunerCounters, cortica_bail, cortica_err, speciate,
};
use cortica_tuner::{Exoself, TunerSettings};
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, info, warn};

const TOP_GENOMES_PERSISTED: usize = 5;
const PAUSE_POLL: Duration = Duration::from_millis(25);

/// The generation monitor: orchestrates evaluation, speciation, tuning and
/// reproduction for one run, consuming control commands at generation
/// boundaries.
///
/// The monitor owns the population for the lifetime of the run; workers see
/// clones during evaluation and the mutation engine consumes parents and
/// returns fresh offspring. All storage calls happen on this thread.
#[derive(Debug)]
pub struct Monitor {
    params: MonitorParams,
    control: Receiver<MonitorCommand>,
    pending: RefCell<VecDeque<MonitorCommand>>,
    token: CancelToken,
    state: MonitorState,
}

/// Histories and counters accumulated over one run.
struct RunState {
    ids: IdSource,
    generation: usize,
    executed: usize,
    generation_offset: usize,
    cumulative_evaluations: usize,
    best_by_generation: Vec<f32>,
    diagnostics: Vec<GenerationDiagnostics>,
    species: SpeciesHistory,
    lineage: Vec<LineageRecord>,
    stagnation: HashMap<SpecieKey, Tracker<f32>>,
    lastgen_accepted: Vec<Genome>,
    running_best: Option<ScoredGenome>,
}

impl RunState {
    fn stagnation_counts(&self) -> HashMap<SpecieKey, usize> {
        self.stagnation
            .iter()
            .map(|(key, tracker)| (key.clone(), tracker.stagnation()))
            .collect()
    }

    fn observe_best(&mut self, population: &[ScoredGenome]) {
        for scored in population {
            let better = self
                .running_best
                .as_ref()
                .map(|best| scored.fitness > best.fitness)
                .unwrap_or(true);
            if better {
                self.running_best = Some(scored.clone());
            }
        }
    }
}

struct TuneStepFlags {
    stop_seen: bool,
    cancelled: bool,
}

impl Monitor {
    pub(crate) fn new(
        params: MonitorParams,
        control: Receiver<MonitorCommand>,
        token: CancelToken,
        state: MonitorState,
    ) -> Self {
        Monitor {
            params,
            control,
            pending: RefCell::new(VecDeque::new()),
            token,
            state,
        }
    }

    /// The run's cancellation root; cancel it to abort the run externally.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Execute the run to termination on the calling thread.
    pub fn run(mut self) -> CorticaResult<RunResult> {
        let run_id = self.params.run_id;
        info!(%run_id, scape = self.params.scape.name(), "run starting");

        let mut state = self.continuation_state()?;
        let mut population: Vec<ScoredGenome> = Vec::new();
        let mut offspring = self.seed_offspring(&mut state)?;
        let pop_size = offspring.len();

        self.seed_strategies(&mut offspring);
        self.persist_config(pop_size)?;

        let evaluator = EvaluatorPool::new(self.params.workers);

        let outcome = if self.params.steady_state {
            self.run_steady(&mut state, &evaluator, &mut population, offspring, pop_size)
        } else {
            self.run_generational(&mut state, &evaluator, &mut population, offspring, pop_size)
        };

        let termination = match outcome {
            Ok(()) => match self.state {
                MonitorState::Terminated(reason) => reason,
                _ => TerminationReason::Completed,
            },
            Err(err) if err.is_cancelled() => TerminationReason::Cancelled,
            Err(err) => return Err(err),
        };

        self.persist_final(&state, &population, pop_size)?;

        info!(%run_id, ?termination, generations = state.executed, "run finished");

        Ok(RunResult {
            run_id,
            termination,
            generations_executed: state.executed,
            best_by_generation: state.best_by_generation,
            best: state.running_best,
            final_population: population,
            species: state.species,
            lineage: state.lineage,
            diagnostics: state.diagnostics,
            cumulative_evaluations: state.cumulative_evaluations,
        })
    }

    // ---- setup ----------------------------------------------------------

    /// Resolve continuation: load the prior run's snapshot, verify the
    /// scape matches, adopt its population size when ours is implicit, and
    /// prepend its history so downstream consumers see one continuous run.
    fn continuation_state(&mut self) -> CorticaResult<RunState> {
        let mut state = RunState {
            ids: self.params.ids.clone(),
            generation: 0,
            executed: 0,
            generation_offset: 0,
            cumulative_evaluations: 0,
            best_by_generation: Vec::new(),
            diagnostics: Vec::new(),
            species: SpeciesHistory::new(),
            lineage: Vec::new(),
            stagnation: HashMap::new(),
            lastgen_accepted: Vec::new(),
            running_best: None,
        };

        let Some(prev_id) = self.params.continue_population_id else {
            return Ok(state);
        };

        let stored = self
            .params
            .storage
            .load_snapshot(prev_id)?
            .ok_or_else(|| cortica_err!(Storage: "no stored run for {}", prev_id))?;

        let snapshot = stored
            .snapshot
            .ok_or_else(|| cortica_err!(Storage: "stored run {} has no population snapshot", prev_id))?;

        if snapshot.scape != self.params.scape.name() {
            cortica_bail!(
                ScapeMismatch: "snapshot {} was evolved on scape {:?}, run configured for {:?}",
                prev_id, snapshot.scape, self.params.scape.name()
            );
        }

        for genome in &snapshot.genomes {
            state.ids.skip_past(genome);
        }

        state.generation = snapshot.generations_executed;
        state.generation_offset = snapshot.generations_executed;
        state.best_by_generation = stored.best_by_generation;
        state.diagnostics = stored.diagnostics;
        state.lineage = stored.lineage;
        state.species = stored.species;

        if self.params.population_size.is_none() {
            self.params.population_size = Some(snapshot.population_size);
        }
        self.params.seed_population = snapshot.genomes;

        info!(
            from = %prev_id,
            generation_offset = state.generation_offset,
            "continuing run from snapshot"
        );

        Ok(state)
    }

    fn seed_offspring(&mut self, state: &mut RunState) -> CorticaResult<Vec<Genome>> {
        let mut seed = std::mem::take(&mut self.params.seed_population);
        let target = self.params.population_size.unwrap_or(seed.len());

        if seed.is_empty() || target == 0 {
            cortica_bail!(InvalidConfig: "seed population resolved empty");
        }

        // Resize to the explicit population size: truncate, or pad with
        // clones of the incumbents under fresh genome ids.
        seed.truncate(target);
        let mut next = 0usize;
        while seed.len() < target {
            let clone = seed[next % seed.len()].clone_with_id(&mut state.ids);
            seed.push(clone);
            next += 1;
        }

        for genome in &seed {
            state.ids.skip_past(genome);
            genome.validate()?;
        }

        Ok(seed)
    }

    /// Propagate the configured tuner settings into each seed genome's
    /// evolvable strategy; the meta operators take it from there.
    fn seed_strategies(&self, offspring: &mut [Genome]) {
        let Some(settings) = &self.params.tuner else {
            return;
        };

        for genome in offspring.iter_mut() {
            let strategy = genome.strategy_mut();
            strategy.tuning_selection = settings.selection;
            strategy.annealing_factor = settings.annealing_factor;
        }
    }

    fn persist_config(&self, pop_size: usize) -> CorticaResult<()> {
        self.params.storage.persist_config(
            self.params.run_id,
            &RunConfigSummary {
                scape: self.params.scape.name().to_string(),
                population_size: pop_size,
                generations: self.params.generations,
                evaluations_limit: self.params.evaluations_limit,
                fitness_goal: self.params.fitness_goal,
                workers: self.params.workers,
                selector: self.params.selector_name.clone(),
                postprocessor: self.params.postprocessor_name.clone(),
                specie_identifier: self.params.identifier.tag().to_string(),
                tuner_enabled: self.params.tuner.is_some(),
                steady_state: self.params.steady_state,
            },
        )
    }

    // ---- control --------------------------------------------------------

    fn apply_command(&mut self, command: MonitorCommand, latest: Option<&GenerationDiagnostics>) {
        match command {
            MonitorCommand::Pause => {
                if matches!(self.state, MonitorState::Running | MonitorState::Initialising) {
                    self.state = MonitorState::Paused;
                }
            }
            MonitorCommand::Continue => {
                if self.state == MonitorState::Paused {
                    self.state = MonitorState::Running;
                }
            }
            MonitorCommand::Stop => {
                if !matches!(self.state, MonitorState::Terminated(_)) {
                    self.state = MonitorState::Terminated(TerminationReason::Stopped);
                }
            }
            MonitorCommand::GoalReached => {
                if !matches!(self.state, MonitorState::Terminated(_)) {
                    self.state = MonitorState::Terminated(TerminationReason::GoalReached);
                }
            }
            MonitorCommand::PrintTrace => match latest {
                Some(row) => info!(?row, "trace requested"),
                None => info!("trace requested before the first diagnostics row"),
            },
        }
    }

    /// The pause gate at the head of each generation. Drains queued and
    /// deferred commands, then blocks while paused. Returns once the run
    /// may proceed or is terminated.
    fn control_gate(&mut self, latest: Option<&GenerationDiagnostics>) {
        let deferred: Vec<MonitorCommand> = self.pending.borrow_mut().drain(..).collect();
        for command in deferred {
            self.apply_command(command, latest);
        }

        loop {
            while let Ok(command) = self.control.try_recv() {
                self.apply_command(command, latest);
            }

            match self.state {
                MonitorState::Paused => match self.control.recv_timeout(PAUSE_POLL) {
                    Ok(command) => self.apply_command(command, latest),
                    Err(RecvTimeoutError::Timeout) => {
                        if self.token.is_cancelled() {
                            self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        // Every controller dropped while paused; nothing can
                        // ever resume this run.
                        self.state = MonitorState::Terminated(TerminationReason::Stopped);
                        return;
                    }
                },
                MonitorState::Initialising => {
                    self.state = MonitorState::Running;
                    return;
                }
                _ => return,
            }
        }
    }

    fn is_terminated(&self) -> bool {
        matches!(self.state, MonitorState::Terminated(_))
    }

    // ---- generational loop ---------------------------------------------

    fn run_generational(
        &mut self,
        state: &mut RunState,
        evaluator: &EvaluatorPool,
        population: &mut Vec<ScoredGenome>,
        mut offspring: Vec<Genome>,
        pop_size: usize,
    ) -> CorticaResult<()> {
        while state.executed < self.params.generations {
            let latest = state.diagnostics.last().cloned();
            self.control_gate(latest.as_ref());
            if self.is_terminated() {
                return Ok(());
            }
            if self.token.is_cancelled() {
                self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                return Ok(());
            }

            // Evaluate only the unscored members; elites carry scores over.
            let fresh = match evaluator.evaluate(&offspring, &self.params.scape, &self.token) {
                Ok(fresh) => fresh,
                Err(err) if err.is_cancelled() => {
                    self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                    self.flush_partial_row(state, population);
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            state.cumulative_evaluations += fresh.len();
            population.extend(fresh);

            let (metrics, record) = speciate(
                population,
                &self.params.identifier,
                state.generation,
                state.species.latest(),
            );
            for specie in &record.records {
                state
                    .stagnation
                    .entry(specie.key.clone())
                    .or_default()
                    .update(&specie.best_fitness);
            }
            state.species.push(record);

            let mut shared = population.clone();
            self.params
                .postprocessor
                .apply(&mut shared, &self.params.identifier)?;

            let (best, mean, min) = fitness_stats(population);
            state.best_by_generation.push(best);
            state.observe_best(population);

            let mut row = GenerationDiagnostics {
                generation: state.generation,
                best_fitness: best,
                mean_fitness: mean,
                min_fitness: min,
                species_count: metrics.species_count,
                fingerprint_diversity: metrics.fingerprint_diversity,
                speciation_threshold: None,
                mean_species_size: metrics.mean_species_size,
                largest_species_size: metrics.largest_species_size,
                tuner: TunerCounters::default(),
                tuner_accept_rate: 0.0,
                tuner_evals_per_attempt: 0.0,
                cumulative_evaluations: state.cumulative_evaluations,
            };

            // Goal and budget checks terminate before reproduction.
            if self.params.fitness_goal > 0.0 && best >= self.params.fitness_goal {
                self.finish_generation(state, row);
                self.state = MonitorState::Terminated(TerminationReason::GoalReached);
                return Ok(());
            }
            if self.params.evaluations_limit > 0
                && state.cumulative_evaluations >= self.params.evaluations_limit
            {
                self.finish_generation(state, row);
                self.state = MonitorState::Terminated(TerminationReason::EvaluationBudget);
                return Ok(());
            }

            let elite_count = self.elite_count(pop_size);
            let offspring_count = pop_size.saturating_sub(elite_count).max(1).min(pop_size);
            let elite_count = pop_size - offspring_count;

            let parent_pool = self.parent_pool(&shared);
            let stagnation = state.stagnation_counts();
            let ctx = SelectionContext::new(
                &self.params.identifier,
                state.species.latest(),
                Some(&stagnation),
            );
            let mut parents = self
                .params
                .selector
                .select(&parent_pool, &ctx, offspring_count);
            if parents.is_empty() {
                cortica_bail!(InvalidConfig: "selector {:?} returned no parents", self.params.selector_name);
            }
            restore_raw_fitness(&mut parents, population);

            if self.params.tuner.is_some() {
                let flags = self.tune_parents(state, &mut parents, &mut row.tuner)?;
                if flags.cancelled {
                    self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                    self.finish_generation(state, row);
                    return Ok(());
                }
                if flags.stop_seen {
                    self.state = MonitorState::Terminated(TerminationReason::Stopped);
                    self.finish_generation(state, row);
                    return Ok(());
                }
            }

            // Reproduce: elites survive unchanged, the rest of the next
            // population is bred from the selected parents.
            let mut ranked = population.clone();
            ranked.sort_by(|a, b| {
                b.fitness
                    .partial_cmp(&a.fitness)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            ranked.truncate(elite_count);

            let child_generation = state.generation + 1;
            let mut next_offspring = Vec::with_capacity(offspring_count);
            for index in 0..offspring_count {
                let parent = &parents[index % parents.len()];
                let (child, mut records) =
                    self.params
                        .mutation
                        .breed(&parent.genome, child_generation, &mut state.ids)?;
                state.lineage.append(&mut records);
                next_offspring.push(child);
            }

            *population = ranked;
            offspring = next_offspring;

            self.finish_generation(state, row);
        }

        Ok(())
    }

    fn finish_generation(&mut self, state: &mut RunState, row: GenerationDiagnostics) {
        debug!(
            generation = row.generation,
            best = row.best_fitness,
            species = row.species_count,
            "generation complete"
        );
        state.diagnostics.push(row.derive_rates());
        state.generation += 1;
        state.executed += 1;
    }

    /// Cancellation mid-evaluation still emits a final partial row so the
    /// persisted diagnostics always cover the work actually done.
    fn flush_partial_row(&self, state: &mut RunState, population: &[ScoredGenome]) {
        let (best, mean, min) = fitness_stats(population);
        state.diagnostics.push(
            GenerationDiagnostics {
                generation: state.generation,
                best_fitness: best,
                mean_fitness: mean,
                min_fitness: min,
                species_count: 0,
                fingerprint_diversity: 0,
                speciation_threshold: None,
                mean_species_size: 0.0,
                largest_species_size: 0,
                tuner: TunerCounters::default(),
                tuner_accept_rate: 0.0,
                tuner_evals_per_attempt: 0.0,
                cumulative_evaluations: state.cumulative_evaluations,
            }
            .derive_rates(),
        );
    }

    fn elite_count(&self, pop_size: usize) -> usize {
        match self.params.elite_count {
            Some(count) => count.min(pop_size),
            None => ((pop_size as f32 * self.params.survival_percentage).floor() as usize)
                .max(1)
                .min(pop_size),
        }
    }

    /// Apply the per-species parent-pool ceiling before selection.
    fn parent_pool(&self, shared: &[ScoredGenome]) -> Vec<ScoredGenome> {
        if self.params.specie_size_limit == 0 {
            return shared.to_vec();
        }

        let limit = self.params.specie_size_limit;
        let mut kept: Vec<ScoredGenome> = Vec::with_capacity(shared.len());
        let mut counts: HashMap<SpecieKey, usize> = HashMap::new();

        let mut ranked = shared.to_vec();
        ranked.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for scored in ranked {
            let key = self.params.identifier.key_for(&scored.genome);
            let count = counts.entry(key).or_insert(0);
            if *count < limit {
                *count += 1;
                kept.push(scored);
            }
        }

        kept
    }

    // ---- tuning ---------------------------------------------------------

    /// Run the exoself over each selected parent. `Stop` commands are
    /// observed between tuner attempts through a child token the command
    /// poll cancels; other commands are deferred to the next gate.
    fn tune_parents(
        &self,
        state: &mut RunState,
        parents: &mut [ScoredGenome],
        counters: &mut TunerCounters,
    ) -> CorticaResult<TuneStepFlags> {
        let settings = self
            .params
            .tuner
            .as_ref()
            .cloned()
            .unwrap_or_default();

        let stop_seen = Cell::new(false);
        let attempt_token = self.token.child();
        let mut accepted_this_gen: Vec<Genome> = Vec::new();

        for parent in parents.iter_mut() {
            if attempt_token.is_cancelled() {
                break;
            }

            let attempts = self.params.attempt_policy.attempts(
                settings.attempts,
                &parent.genome,
                state.executed,
                self.params.generations,
            );
            if attempts == 0 {
                continue;
            }

            counters.invocations += 1;

            let mut agent = match NetworkAgent::compile(&parent.genome) {
                Ok(agent) => agent,
                Err(err) => {
                    warn!(genome = %parent.genome.id(), error = %err, "tuner could not compile agent");
                    continue;
                }
            };

            let invocation_settings = TunerSettings {
                selection: parent.genome.strategy().tuning_selection,
                annealing_factor: parent.genome.strategy().annealing_factor,
                ..settings.clone()
            };

            let exoself = Exoself::new(&invocation_settings, &attempt_token)
                .with_lastgen(&state.lastgen_accepted);

            let scape = &self.params.scape;
            let control = &self.control;
            let pending = &self.pending;
            let poll_token = attempt_token.clone();
            let stop_cell = &stop_seen;

            let outcome = exoself.tune_runtime(
                &mut agent,
                attempts,
                parent.fitness,
                EvalMode::Tuning,
                |mode, agent: &mut NetworkAgent| {
                    // Attempt-boundary command scan: Stop cancels the
                    // attempt token, everything else waits for the gate.
                    while let Ok(command) = control.try_recv() {
                        if command == MonitorCommand::Stop {
                            stop_cell.set(true);
                            poll_token.cancel();
                        } else {
                            pending.borrow_mut().push_back(command);
                        }
                    }

                    let ctx = EvalContext::new(poll_token.clone(), mode);
                    scape.evaluate(&ctx, agent)
                },
            );

            match outcome {
                Ok(outcome) => {
                    counters.attempts += outcome.report.attempts_executed;
                    counters.evaluations += outcome.report.candidate_evaluations;
                    counters.accepted += outcome.report.accepted;
                    counters.rejected += outcome.report.rejected;
                    if outcome.report.goal_reached {
                        counters.goal_hits += 1;
                    }

                    if outcome.report.accepted > 0 {
                        accepted_this_gen.push(outcome.genome.clone());
                    }

                    match parent.genome.strategy().heredity {
                        cortica_core::Heredity::Lamarckian => {
                            parent.genome = outcome.genome;
                            parent.fitness = parent.fitness.max(outcome.fitness);
                        }
                        cortica_core::Heredity::Darwinian => {
                            parent.fitness = parent.fitness.max(outcome.fitness);
                        }
                    }
                }
                Err(err) if err.is_cancelled() => {
                    return Ok(TuneStepFlags {
                        stop_seen: stop_seen.get(),
                        cancelled: !stop_seen.get(),
                    });
                }
                Err(err) => {
                    // Non-fatal per the error policy; count and move on.
                    warn!(genome = %parent.genome.id(), error = %err, "tuner invocation failed");
                }
            }
        }

        state.lastgen_accepted = accepted_this_gen;

        let cancelled_externally = self.token.is_cancelled() && !stop_seen.get();
        Ok(TuneStepFlags {
            stop_seen: stop_seen.get(),
            cancelled: cancelled_externally,
        })
    }

    // ---- steady state ---------------------------------------------------

    /// Steady-state variant: one offspring at a time replaces the current
    /// worst. Diagnostics are emitted every `trace_step_size` evaluations,
    /// and each emission counts as one generation for the histories.
    fn run_steady(
        &mut self,
        state: &mut RunState,
        evaluator: &EvaluatorPool,
        population: &mut Vec<ScoredGenome>,
        offspring: Vec<Genome>,
        pop_size: usize,
    ) -> CorticaResult<()> {
        let trace_step = if self.params.trace_step_size == 0 {
            pop_size
        } else {
            self.params.trace_step_size
        };
        let offspring_budget = self.params.generations.saturating_mul(pop_size);

        // Initial population evaluation.
        let fresh = match evaluator.evaluate(&offspring, &self.params.scape, &self.token) {
            Ok(fresh) => fresh,
            Err(err) if err.is_cancelled() => {
                self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        state.cumulative_evaluations += fresh.len();
        population.extend(fresh);
        state.observe_best(population);

        let mut produced = 0usize;
        let mut since_trace = 0usize;
        let mut window_tuner = TunerCounters::default();

        while produced < offspring_budget {
            let latest = state.diagnostics.last().cloned();
            self.control_gate(latest.as_ref());
            if self.is_terminated() {
                return Ok(());
            }
            if self.token.is_cancelled() {
                self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                return Ok(());
            }

            let mut shared = population.clone();
            self.params
                .postprocessor
                .apply(&mut shared, &self.params.identifier)?;

            let stagnation = state.stagnation_counts();
            let ctx = SelectionContext::new(
                &self.params.identifier,
                state.species.latest(),
                Some(&stagnation),
            );
            let mut parents = self.params.selector.select(&shared, &ctx, 1);
            if parents.is_empty() {
                cortica_bail!(InvalidConfig: "selector {:?} returned no parents", self.params.selector_name);
            }
            restore_raw_fitness(&mut parents, population);

            if self.params.tuner.is_some() {
                let flags = self.tune_parents(state, &mut parents, &mut window_tuner)?;
                if flags.cancelled {
                    self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                    return Ok(());
                }
                if flags.stop_seen {
                    self.state = MonitorState::Terminated(TerminationReason::Stopped);
                    return Ok(());
                }
            }

            let (child, mut records) = self.params.mutation.breed(
                &parents[0].genome,
                state.generation + 1,
                &mut state.ids,
            )?;
            state.lineage.append(&mut records);

            let scored = match evaluator.evaluate(
                std::slice::from_ref(&child),
                &self.params.scape,
                &self.token,
            ) {
                Ok(mut scored) => scored.remove(0),
                Err(err) if err.is_cancelled() => {
                    self.state = MonitorState::Terminated(TerminationReason::Cancelled);
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            state.cumulative_evaluations += 1;
            produced += 1;
            since_trace += 1;

            // Replace the current worst with the newcomer.
            let worst = population
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.fitness
                        .partial_cmp(&b.fitness)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            population[worst] = scored;
            state.observe_best(population);

            let goal_met = self.params.fitness_goal > 0.0
                && population
                    .iter()
                    .any(|scored| scored.fitness >= self.params.fitness_goal);
            let budget_spent = self.params.evaluations_limit > 0
                && state.cumulative_evaluations >= self.params.evaluations_limit;

            if since_trace >= trace_step || produced == offspring_budget || goal_met || budget_spent
            {
                since_trace = 0;
                self.emit_steady_row(state, population, window_tuner);
                window_tuner = TunerCounters::default();
            }

            if goal_met {
                self.state = MonitorState::Terminated(TerminationReason::GoalReached);
                return Ok(());
            }
            if budget_spent {
                self.state = MonitorState::Terminated(TerminationReason::EvaluationBudget);
                return Ok(());
            }
        }

        Ok(())
    }

    fn emit_steady_row(
        &mut self,
        state: &mut RunState,
        population: &[ScoredGenome],
        tuner: TunerCounters,
    ) {
        let (metrics, record) = speciate(
            population,
            &self.params.identifier,
            state.generation,
            state.species.latest(),
        );
        for specie in &record.records {
            state
                .stagnation
                .entry(specie.key.clone())
                .or_default()
                .update(&specie.best_fitness);
        }
        state.species.push(record);

        let (best, mean, min) = fitness_stats(population);
        state.best_by_generation.push(best);

        let row = GenerationDiagnostics {
            generation: state.generation,
            best_fitness: best,
            mean_fitness: mean,
            min_fitness: min,
            species_count: metrics.species_count,
            fingerprint_diversity: metrics.fingerprint_diversity,
            speciation_threshold: None,
            mean_species_size: metrics.mean_species_size,
            largest_species_size: metrics.largest_species_size,
            tuner,
            tuner_accept_rate: 0.0,
            tuner_evals_per_attempt: 0.0,
            cumulative_evaluations: state.cumulative_evaluations,
        };
        self.finish_generation(state, row);
    }

    // ---- persistence ----------------------------------------------------

    fn persist_final(
        &self,
        state: &RunState,
        population: &[ScoredGenome],
        pop_size: usize,
    ) -> CorticaResult<()> {
        let storage = &self.params.storage;
        let run_id = self.params.run_id;

        storage.persist_fitness_history(run_id, &state.best_by_generation)?;
        storage.persist_diagnostics(run_id, &state.diagnostics)?;
        storage.persist_species(run_id, &state.species)?;
        storage.persist_lineage(run_id, &state.lineage)?;

        let mut top = population.to_vec();
        top.sort_by(|a, b| {
            b.fitness
                .partial_cmp(&a.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top.truncate(TOP_GENOMES_PERSISTED);
        storage.persist_top(run_id, &top)?;

        storage.persist_scape_summary(
            run_id,
            &ScapeSummary {
                scape: self.params.scape.name().to_string(),
                best_fitness: state
                    .running_best
                    .as_ref()
                    .map(|scored| scored.fitness)
                    .unwrap_or(f32::NEG_INFINITY),
                evaluations: state.cumulative_evaluations,
            },
        )?;

        let genomes = population
            .iter()
            .map(|scored| scored.genome.clone())
            .collect::<Vec<_>>();
        storage.persist_snapshot(&PopulationSnapshot {
            run_id,
            scape: self.params.scape.name().to_string(),
            generations_executed: state.generation_offset + state.executed,
            population_size: pop_size,
            genome_ids: genomes.iter().map(|genome| genome.id()).collect(),
            genomes,
        })?;

        Ok(())
    }
}

/// Selection ranks on post-processed fitness; tuning baselines and lineage
/// reason about raw fitness, so selected parents are mapped back onto their
/// raw scores.
fn restore_raw_fitness(parents: &mut [ScoredGenome], population: &[ScoredGenome]) {
    for parent in parents.iter_mut() {
        if let Some(raw) = population
            .iter()
            .find(|scored| scored.genome.id() == parent.genome.id())
        {
            parent.fitness = raw.fitness;
        }
    }
}

fn fitness_stats(population: &[ScoredGenome]) -> (f32, f32, f32) {
    if population.is_empty() {
        return (f32::NEG_INFINITY, 0.0, f32::INFINITY);
    }

    let mut best = f32::NEG_INFINITY;
    let mut min = f32::INFINITY;
    let mut sum = 0.0;
    for scored in population {
        best = best.max(scored.fitness);
        min = min.min(scored.fitness);
        sum += scored.fitness;
    }

    (best, sum / population.len() as f32, min)
}
