mod common;

use common::{LinearScape, SlowScape, XorScape, linear_population, near_optimal_linear_population};
use cortica_core::{
    ErrorCode, FitnessPostprocessor, IdSource, MemoryStorage, SpecieIdentifier, TopoCountPolicy,
    random_provider,
};
use cortica_engines::{
    MonitorBuilder, MonitorCommand, Polis, TerminationReason, diff,
};
use cortica_mutators::{
    AddInlink, AddNeuron, MutateWeights, OperatorCatalogue, RemoveNeuron, RemoveSynapse,
};
use cortica_tuner::TunerSettings;
use std::sync::Arc;
use std::time::Duration;

fn s1_catalogue() -> OperatorCatalogue {
    OperatorCatalogue::builder()
        .weighted(0.70, MutateWeights::default())
        .weighted(0.10, AddInlink)
        .weighted(0.08, RemoveSynapse)
        .weighted(0.07, AddNeuron)
        .weighted(0.05, RemoveNeuron)
        .build()
        .unwrap()
}

#[test]
fn s1_xor_elite_no_tuning() {
    let result = random_provider::scoped_seed(42, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .scape(Arc::new(XorScape))
            .seed(2, 1, 8)
            .generations(2)
            .selector_name("elite")
            .catalogue(s1_catalogue(), TopoCountPolicy::Const(2))
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    assert_eq!(result.best_by_generation.len(), 2);
    assert!(result.best_by_generation[1] >= result.best_by_generation[0]);
    assert_eq!(result.termination, TerminationReason::Completed);
    assert!(
        result.lineage.iter().any(|record| record.is_structural()),
        "expected at least one structural mutation in lineage"
    );
}

#[test]
fn s2_fitness_goal_short_circuits() {
    let storage = Arc::new(MemoryStorage::new());

    let result = random_provider::scoped_seed(7, || {
        let mut ids = IdSource::new();
        let population = linear_population(4, &mut ids);

        let (monitor, _controller) = MonitorBuilder::new()
            .scape(Arc::new(LinearScape))
            .seed_population(population)
            .id_source(ids)
            .generations(6)
            .fitness_goal(0.99)
            .selector_name("elite")
            .storage(storage.clone())
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    assert_eq!(result.termination, TerminationReason::GoalReached);
    assert_eq!(result.best_by_generation.len(), 1);

    let stored = storage.get(result.run_id).unwrap();
    assert_eq!(stored.snapshot.unwrap().generations_executed, 1);
}

#[test]
fn s3_evaluations_limit_terminates_after_first_generation() {
    let result = random_provider::scoped_seed(11, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .scape(Arc::new(XorScape))
            .seed(2, 1, 4)
            .generations(6)
            .evaluations_limit(4)
            .selector_name("elite")
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    assert_eq!(result.termination, TerminationReason::EvaluationBudget);
    assert_eq!(result.generations_executed, 1);
    assert!(result.cumulative_evaluations <= 4 + 4);
}

#[test]
fn s4_paused_run_control() {
    random_provider::set_seed(13);
    let polis = Polis::new();

    let gens = 3usize;
    let handle = polis
        .launch(
            MonitorBuilder::new()
                .scape(Arc::new(XorScape))
                .seed(2, 1, 4)
                .generations(gens)
                .selector_name("elite")
                .start_paused(true),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(30));
    assert!(!handle.is_finished(), "paused run must not make progress");

    assert!(handle.control(MonitorCommand::Continue).unwrap());
    let result = handle.join().unwrap();
    assert_eq!(result.best_by_generation.len(), gens);
    assert_eq!(result.termination, TerminationReason::Completed);

    // A stopped run ends early and stays stopped.
    let gens = 200usize;
    let handle = polis
        .launch(
            MonitorBuilder::new()
                .scape(Arc::new(SlowScape {
                    delay: Duration::from_millis(2),
                }))
                .seed(1, 1, 4)
                .generations(gens)
                .selector_name("elite"),
        )
        .unwrap();
    let run_id = handle.run_id();

    std::thread::sleep(Duration::from_millis(40));
    handle.control(MonitorCommand::Stop).unwrap();
    let result = handle.join().unwrap();

    assert_eq!(result.termination, TerminationReason::Stopped);
    assert!(result.best_by_generation.len() < gens);

    // After termination the run is unregistered: control returns
    // RunNotActive.
    let err = polis.command(run_id, MonitorCommand::Continue).unwrap_err();
    assert_eq!(err.code(), ErrorCode::RunNotActive);
}

#[test]
fn s5_tuning_never_regresses_final_best() {
    let run = |tuner: Option<TunerSettings>| {
        random_provider::scoped_seed(17, || {
            let mut ids = IdSource::new();
            let population = near_optimal_linear_population(4, &mut ids);

            let mut builder = MonitorBuilder::new()
                .scape(Arc::new(LinearScape))
                .seed_population(population)
                .id_source(ids)
                .generations(3)
                .selector_name("elite")
                .catalogue(s1_catalogue(), TopoCountPolicy::Const(1));

            if let Some(settings) = tuner {
                builder = builder.tuner(settings);
            }

            let (monitor, _controller) = builder.build().unwrap();
            monitor.run().unwrap()
        })
    };

    let without = run(None);
    let with = run(Some(TunerSettings {
        attempts: 4,
        steps: 6,
        step_size: 0.35,
        ..TunerSettings::default()
    }));

    let without_best = without.final_best_fitness().unwrap();
    let with_best = with.final_best_fitness().unwrap();

    // Elitism pins both runs' best into [0.99, 1.0] on this scape, so the
    // tuned run can never fall meaningfully behind the untuned one.
    assert!(without_best >= 0.99);
    assert!(with_best >= without_best - 0.05);

    let tuned_rows = with
        .diagnostics
        .iter()
        .map(|row| row.tuner)
        .fold(0usize, |acc, tuner| acc + tuner.invocations);
    assert!(tuned_rows > 0, "tuner was configured but never invoked");
}

#[test]
fn s6_species_diff_closure() {
    let result = random_provider::scoped_seed(23, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .scape(Arc::new(XorScape))
            .seed(2, 1, 6)
            .generations(3)
            .selector_name("tournament")
            .identifier(SpecieIdentifier::TotN)
            .catalogue(s1_catalogue(), TopoCountPolicy::Const(2))
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    let history = result.species.generations();
    assert_eq!(history.len(), 3);

    for window in history.windows(2) {
        let delta = diff(&window[0], &window[1]);

        assert_eq!(
            delta.added.len() + delta.changed.len() + delta.unchanged,
            window[1].records.len()
        );
        assert_eq!(
            delta.removed.len(),
            window[0].records.len() - (delta.unchanged + delta.changed.len())
        );
        assert_eq!(window[1].new_keys, delta.added);
        assert_eq!(window[1].extinct_keys, delta.removed);
    }
}

#[test]
fn determinism_under_a_fixed_seed() {
    let run = || {
        random_provider::scoped_seed(42, || {
            let (monitor, _controller) = MonitorBuilder::new()
                .scape(Arc::new(XorScape))
                .seed(2, 1, 6)
                .generations(3)
                .workers(4)
                .selector_name("elite")
                .catalogue(s1_catalogue(), TopoCountPolicy::Const(1))
                .build()
                .unwrap();
            monitor.run().unwrap()
        })
    };

    let first = run();
    let second = run();

    assert_eq!(first.best_by_generation, second.best_by_generation);
    assert_eq!(first.lineage, second.lineage);

    let ids = |result: &cortica_engines::RunResult| {
        result
            .final_population
            .iter()
            .map(|scored| scored.genome.id())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn invariants_hold_across_a_run() {
    let result = random_provider::scoped_seed(29, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .scape(Arc::new(XorScape))
            .seed(2, 1, 8)
            .generations(4)
            .selector_name("rank")
            .postprocessor(FitnessPostprocessor::SizeProportional)
            .catalogue(OperatorCatalogue::standard().unwrap(), TopoCountPolicy::Const(2))
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    for scored in &result.final_population {
        scored.genome.validate().unwrap();
        assert!(!scored.genome.sensors().is_empty());
        assert!(!scored.genome.actuators().is_empty());
        assert!(scored.fitness.is_finite());
    }

    // Lineage is monotone in generation and dense in ids.
    let mut last_generation = 0;
    for record in &result.lineage {
        assert!(record.generation >= last_generation);
        last_generation = record.generation;
    }
}

#[test]
fn steady_state_replaces_one_at_a_time() {
    let result = random_provider::scoped_seed(31, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .scape(Arc::new(LinearScape))
            .seed(1, 1, 4)
            .generations(2)
            .steady_state(true)
            .trace_step_size(4)
            .selector_name("tournament")
            .catalogue(s1_catalogue(), TopoCountPolicy::Const(1))
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    assert_eq!(result.termination, TerminationReason::Completed);
    assert_eq!(result.final_population.len(), 4);
    // Seed evaluation plus one per offspring: 4 + 2 * 4.
    assert_eq!(result.cumulative_evaluations, 12);
    assert_eq!(result.diagnostics.len(), 2);
    assert!(!result.lineage.is_empty());
}

#[test]
fn continuation_adopts_snapshot_and_prepends_history() {
    let storage = Arc::new(MemoryStorage::new());

    let first = random_provider::scoped_seed(37, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .run_id(cortica_core::RunId(1))
            .scape(Arc::new(XorScape))
            .seed(2, 1, 4)
            .generations(2)
            .selector_name("elite")
            .storage(storage.clone())
            .build()
            .unwrap();
        monitor.run().unwrap()
    });
    assert_eq!(first.generations_executed, 2);

    let second = random_provider::scoped_seed(37, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .run_id(cortica_core::RunId(2))
            .scape(Arc::new(XorScape))
            .continue_population(cortica_core::RunId(1))
            .generations(3)
            .selector_name("elite")
            .storage(storage.clone())
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    assert_eq!(second.generations_executed, 3);
    // Two prior generations prepended plus three new ones.
    assert_eq!(second.best_by_generation.len(), 5);
    assert_eq!(second.diagnostics.len(), 5);
    assert_eq!(second.species.len(), 5);
    assert_eq!(second.diagnostics[2].generation, 2);

    let stored = storage.get(cortica_core::RunId(2)).unwrap();
    assert_eq!(stored.snapshot.unwrap().generations_executed, 5);
}

#[test]
fn continuation_rejects_a_different_scape() {
    let storage = Arc::new(MemoryStorage::new());

    random_provider::scoped_seed(41, || {
        let (monitor, _controller) = MonitorBuilder::new()
            .run_id(cortica_core::RunId(1))
            .scape(Arc::new(XorScape))
            .seed(2, 1, 4)
            .generations(1)
            .selector_name("elite")
            .storage(storage.clone())
            .build()
            .unwrap();
        monitor.run().unwrap()
    });

    let (monitor, _controller) = MonitorBuilder::new()
        .run_id(cortica_core::RunId(2))
        .scape(Arc::new(LinearScape))
        .continue_population(cortica_core::RunId(1))
        .generations(1)
        .selector_name("elite")
        .storage(storage)
        .build()
        .unwrap();

    let err = monitor.run().unwrap_err();
    assert_eq!(err.root_code(), ErrorCode::ScapeMismatch);
}

#[test]
fn polis_scape_registry() {
    let polis = Polis::new();
    polis.register_scape(Arc::new(XorScape));

    assert_eq!(polis.scape("xor").unwrap().name(), "xor");
    let err = polis.scape("cartpole").unwrap_err();
    assert_eq!(err.code(), ErrorCode::ScapeNotRegistered);
}

#[test]
fn builder_rejects_bad_configuration() {
    let err = MonitorBuilder::new()
        .scape(Arc::new(XorScape))
        .seed(2, 1, 4)
        .selector_name("galactic")
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfig);

    let err = MonitorBuilder::new()
        .scape(Arc::new(XorScape))
        .seed(2, 1, 4)
        .tuner(TunerSettings {
            annealing_factor: 1.5,
            ..TunerSettings::default()
        })
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfig);

    let err = MonitorBuilder::new().scape(Arc::new(XorScape)).build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfig);
}
