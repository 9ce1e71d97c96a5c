use cortica_core::{
    Activation, CorticaResult, EvalContext, Evaluation, Genome, IdSource, NetworkAgent, Scape,
};
use std::time::Duration;

/// Classic XOR benchmark: fitness is `4 - sum of squared errors` over the
/// four input rows, so a perfect network scores 4.0.
#[derive(Debug)]
pub struct XorScape;

impl Scape for XorScape {
    fn name(&self) -> &str {
        "xor"
    }

    fn evaluate(&self, ctx: &EvalContext, agent: &mut NetworkAgent) -> CorticaResult<Evaluation> {
        let rows = [
            ([0.0_f32, 0.0], 0.0_f32),
            ([0.0, 1.0], 1.0),
            ([1.0, 0.0], 1.0),
            ([1.0, 1.0], 0.0),
        ];

        let mut error = 0.0;
        for (inputs, expected) in rows {
            agent.reactivate(ctx.mode());
            let outputs = agent.run_step(&inputs)?;
            let actual = outputs.first().copied().unwrap_or(0.0);
            error += (actual - expected) * (actual - expected);
        }

        Ok(Evaluation::new(4.0 - error).with_trace("sse", error as f64))
    }
}

/// One-step scape with fitness `1 - (out - 1)^2`: peaks at 1.0 when the
/// network emits exactly 1.0 for input 1.0.
#[derive(Debug)]
pub struct LinearScape;

impl Scape for LinearScape {
    fn name(&self) -> &str {
        "linear"
    }

    fn evaluate(&self, ctx: &EvalContext, agent: &mut NetworkAgent) -> CorticaResult<Evaluation> {
        agent.reactivate(ctx.mode());
        let outputs = agent.run_step(&[1.0])?;
        let out = outputs.first().copied().unwrap_or(0.0);
        Ok(Evaluation::new(1.0 - (out - 1.0) * (out - 1.0)))
    }
}

/// Linear scape that sleeps per evaluation, for control-timing tests.
#[derive(Debug)]
pub struct SlowScape {
    pub delay: Duration,
}

impl Scape for SlowScape {
    fn name(&self) -> &str {
        "slow_linear"
    }

    fn evaluate(&self, ctx: &EvalContext, agent: &mut NetworkAgent) -> CorticaResult<Evaluation> {
        std::thread::sleep(self.delay);
        LinearScape.evaluate(ctx, agent)
    }
}

/// Seed population for [LinearScape] where exactly one genome is already
/// at the optimum: a linear actuator fed by weight 1.0.
pub fn linear_population(size: usize, ids: &mut IdSource) -> Vec<Genome> {
    let mut population = Vec::with_capacity(size);

    for index in 0..size {
        let mut genome = Genome::seed(1, 1, ids);
        let actuator = genome.actuators()[0];
        genome.neuron_mut(actuator).unwrap().activation = Activation::Linear;
        genome.synapses_mut()[0].weight = if index == 0 { 1.0 } else { 0.2 };
        population.push(genome);
    }

    population
}

/// Seed population near (but not at) the linear optimum.
pub fn near_optimal_linear_population(size: usize, ids: &mut IdSource) -> Vec<Genome> {
    let mut population = linear_population(size, ids);
    population[0].synapses_mut()[0].weight = 0.9;
    population
}
