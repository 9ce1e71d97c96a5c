use cortica_core::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scores a genome by its first synapse weight; counts evaluations.
#[derive(Debug)]
struct WeightScape {
    calls: AtomicUsize,
}

impl WeightScape {
    fn new() -> Self {
        WeightScape {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Scape for WeightScape {
    fn name(&self) -> &str {
        "weight"
    }

    fn evaluate(&self, _ctx: &EvalContext, agent: &mut NetworkAgent) -> CorticaResult<Evaluation> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let weight = agent.genome().synapses()[0].weight;
        Ok(Evaluation::new(weight))
    }
}

#[derive(Debug)]
struct NanScape;

impl Scape for NanScape {
    fn name(&self) -> &str {
        "nan"
    }

    fn evaluate(&self, _ctx: &EvalContext, _agent: &mut NetworkAgent) -> CorticaResult<Evaluation> {
        Ok(Evaluation::new(f32::NAN))
    }
}

fn population(count: usize) -> Vec<Genome> {
    let mut ids = IdSource::new();
    random_provider::scoped_seed(57, || {
        (0..count)
            .map(|i| {
                let mut genome = Genome::seed(1, 1, &mut ids);
                genome.synapses_mut()[0].weight = i as f32 * 0.25;
                genome
            })
            .collect()
    })
}

#[test]
fn parallel_evaluation_matches_serial() {
    let population = population(16);
    let scape: Arc<dyn Scape> = Arc::new(WeightScape::new());
    let token = CancelToken::new();

    let serial = EvaluatorPool::new(1)
        .evaluate(&population, &scape, &token)
        .unwrap();
    let parallel = EvaluatorPool::new(4)
        .evaluate(&population, &scape, &token)
        .unwrap();

    assert_eq!(serial.len(), parallel.len());
    for (a, b) in serial.iter().zip(&parallel) {
        assert_eq!(a.genome.id(), b.genome.id());
        assert_eq!(a.fitness, b.fitness);
    }
}

#[test]
fn every_genome_is_evaluated_exactly_once() {
    let population = population(9);
    let scape = Arc::new(WeightScape::new());
    let as_dyn: Arc<dyn Scape> = scape.clone();

    EvaluatorPool::new(3)
        .evaluate(&population, &as_dyn, &CancelToken::new())
        .unwrap();

    assert_eq!(scape.calls.load(Ordering::Relaxed), 9);
}

#[test]
fn non_finite_fitness_is_an_evaluation_failure() {
    let population = population(2);
    let scape: Arc<dyn Scape> = Arc::new(NanScape);

    let err = EvaluatorPool::new(1)
        .evaluate(&population, &scape, &CancelToken::new())
        .unwrap_err();
    assert_eq!(err.root_code(), ErrorCode::Evaluation);
}

#[test]
fn speciate_and_postprocess_compose_over_evaluated_population() {
    let population = population(6);
    let scape: Arc<dyn Scape> = Arc::new(WeightScape::new());

    let mut scored = EvaluatorPool::new(2)
        .evaluate(&population, &scape, &CancelToken::new())
        .unwrap();

    let identifier = SpecieIdentifier::Fingerprint;
    let (metrics, record) = speciate(&scored, &identifier, 0, None);

    assert_eq!(
        record.records.iter().map(|r| r.size).sum::<usize>(),
        scored.len()
    );
    assert!(metrics.fingerprint_diversity >= 1);

    let raw = scored.iter().map(|s| s.fitness).collect::<Vec<_>>();
    FitnessPostprocessor::SizeProportional
        .apply(&mut scored, &identifier)
        .unwrap();

    for (before, after) in raw.iter().zip(scored.iter()) {
        assert!(after.fitness <= *before || *before == 0.0);
    }
}
