use crate::agent::NetworkAgent;
use crate::genome::Genome;
use crate::scape::{EvalContext, EvalMode, Scape, Trace};
use crate::{CancelToken, Executor};
use cortica_error::{CorticaError, CorticaResult, cortica_bail, ensure};
use std::sync::Arc;

/// A genome paired with its last-evaluated fitness and the scape's trace.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoredGenome {
    pub genome: Genome,
    pub fitness: f32,
    pub trace: Trace,
}

impl ScoredGenome {
    pub fn new(genome: Genome, fitness: f32) -> Self {
        ScoredGenome {
            genome,
            fitness,
            trace: Trace::default(),
        }
    }
}

/// Fans scape evaluations out across a fixed worker pool.
///
/// Internal execution order is nondeterministic but results are reassembled
/// by input index, so the returned vector always lines up with the input
/// population. A single scape error fails the whole call; cancellation
/// drains in-flight work and surfaces as `Cancelled`.
pub struct EvaluatorPool {
    executor: Arc<Executor>,
}

impl EvaluatorPool {
    pub fn new(workers: usize) -> Self {
        let executor = if workers <= 1 {
            Executor::Serial
        } else {
            Executor::worker_pool(workers)
        };

        EvaluatorPool {
            executor: Arc::new(executor),
        }
    }

    pub fn with_executor(executor: Arc<Executor>) -> Self {
        EvaluatorPool { executor }
    }

    pub fn num_workers(&self) -> usize {
        self.executor.num_workers()
    }

    /// Evaluate every genome against the scape, returning scores indexed
    /// identically to the input population.
    pub fn evaluate(
        &self,
        population: &[Genome],
        scape: &Arc<dyn Scape>,
        token: &CancelToken,
    ) -> CorticaResult<Vec<ScoredGenome>> {
        self.evaluate_mode(population, scape, token, EvalMode::Full)
    }

    pub fn evaluate_mode(
        &self,
        population: &[Genome],
        scape: &Arc<dyn Scape>,
        token: &CancelToken,
        mode: EvalMode,
    ) -> CorticaResult<Vec<ScoredGenome>> {
        if token.is_cancelled() {
            cortica_bail!(Cancelled: "evaluation cancelled before dispatch");
        }

        let jobs = population
            .iter()
            .enumerate()
            .map(|(idx, genome)| {
                let genome = genome.clone();
                let scape = Arc::clone(scape);
                let token = token.clone();
                move || (idx, evaluate_one(genome, &scape, &token, mode))
            })
            .collect::<Vec<_>>();

        let mut results = self.executor.execute_batch(jobs);
        results.sort_by_key(|(idx, _)| *idx);

        let mut scored = Vec::with_capacity(results.len());
        let mut failure: Option<CorticaError> = None;
        for (_, result) in results {
            match result {
                Ok(item) => scored.push(item),
                Err(err) if err.is_cancelled() => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                Err(err) => {
                    // A real scape failure outranks cancellation noise from
                    // the drained remainder of the batch.
                    match &failure {
                        Some(existing) if !existing.is_cancelled() => {}
                        _ => failure = Some(err),
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        if token.is_cancelled() {
            cortica_bail!(Cancelled: "evaluation cancelled");
        }

        Ok(scored)
    }
}

fn evaluate_one(
    genome: Genome,
    scape: &Arc<dyn Scape>,
    token: &CancelToken,
    mode: EvalMode,
) -> CorticaResult<ScoredGenome> {
    // A cancelled token drains the queue: no new work is started past the
    // genome currently executing on each worker.
    if token.is_cancelled() {
        cortica_bail!(Cancelled: "evaluation drained");
    }

    let mut agent = NetworkAgent::compile(&genome)?;
    let ctx = EvalContext::new(token.clone(), mode);

    let evaluation = scape
        .evaluate(&ctx, &mut agent)
        .map_err(|e| e.with_context(format!("scape {:?} failed on genome {}", scape.name(), genome.id())))?;

    ensure!(
        evaluation.fitness.is_finite(),
        Evaluation: "scape {:?} produced non-finite fitness for genome {}", scape.name(), genome.id()
    );

    Ok(ScoredGenome {
        genome,
        fitness: evaluation.fitness,
        trace: evaluation.trace,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::IdSource;
    use crate::random_provider;
    use crate::scape::Evaluation;
    use cortica_error::cortica_err;

    #[derive(Debug)]
    struct SynapseCountScape;

    impl Scape for SynapseCountScape {
        fn name(&self) -> &str {
            "synapse_count"
        }

        fn evaluate(
            &self,
            _ctx: &EvalContext,
            agent: &mut NetworkAgent,
        ) -> CorticaResult<Evaluation> {
            Ok(Evaluation::new(agent.genome().synapses().len() as f32))
        }
    }

    #[derive(Debug)]
    struct FailingScape;

    impl Scape for FailingScape {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(
            &self,
            _ctx: &EvalContext,
            _agent: &mut NetworkAgent,
        ) -> CorticaResult<Evaluation> {
            Err(cortica_err!(Evaluation: "episode blew up"))
        }
    }

    fn population(count: usize) -> Vec<Genome> {
        let mut ids = IdSource::new();
        random_provider::scoped_seed(5, || {
            (0..count).map(|i| Genome::seed(1 + i % 2, 1, &mut ids)).collect()
        })
    }

    #[test]
    fn results_line_up_with_input_order() {
        let pool = EvaluatorPool::new(4);
        let population = population(8);
        let scape: Arc<dyn Scape> = Arc::new(SynapseCountScape);

        let scored = pool
            .evaluate(&population, &scape, &CancelToken::new())
            .unwrap();

        assert_eq!(scored.len(), population.len());
        for (input, output) in population.iter().zip(&scored) {
            assert_eq!(input.id(), output.genome.id());
            assert_eq!(output.fitness, input.synapses().len() as f32);
        }
    }

    #[test]
    fn single_failure_fails_the_generation() {
        let pool = EvaluatorPool::new(2);
        let population = population(4);
        let scape: Arc<dyn Scape> = Arc::new(FailingScape);

        let err = pool
            .evaluate(&population, &scape, &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.root_code(), cortica_error::ErrorCode::Evaluation);
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let pool = EvaluatorPool::new(2);
        let population = population(4);
        let scape: Arc<dyn Scape> = Arc::new(SynapseCountScape);

        let token = CancelToken::new();
        token.cancel();

        let err = pool.evaluate(&population, &scape, &token).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn serial_pool_reports_one_worker() {
        assert_eq!(EvaluatorPool::new(1).num_workers(), 1);
        assert_eq!(EvaluatorPool::new(3).num_workers(), 3);
    }
}
