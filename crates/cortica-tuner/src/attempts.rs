use cortica_core::Genome;

/// How the configured attempt budget scales per exoself invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptPolicy {
    /// Use the configured value verbatim. Configurations may spell this
    /// `fixed` or `const`.
    Fixed,
    /// Scale down linearly as the run progresses, never below `min`.
    LinearDecay { min: usize },
    /// Scale with synapse count: `round(attempts * scale * (1 + |syn|/10))`.
    TopologyScaled { scale: f32, min: usize, max: usize },
    /// `20 + clamp(round(|neurons|^power), 0, 100)`.
    NSizeProportional { power: f32 },
    /// `10 + clamp(round(|synapses|^power), 0, 100)`.
    WSizeProportional { power: f32 },
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        AttemptPolicy::Fixed
    }
}

impl AttemptPolicy {
    /// Resolve the attempt count for one invocation.
    pub fn attempts(
        &self,
        configured: usize,
        genome: &Genome,
        generations_done: usize,
        total_generations: usize,
    ) -> usize {
        match *self {
            AttemptPolicy::Fixed => configured,
            AttemptPolicy::LinearDecay { min } => {
                if total_generations == 0 {
                    return configured.max(min);
                }
                let remaining = total_generations.saturating_sub(generations_done);
                let scaled =
                    (configured as f32 * remaining as f32 / total_generations as f32).round();
                (scaled as usize).max(min)
            }
            AttemptPolicy::TopologyScaled { scale, min, max } => {
                let synapses = genome.synapses().len() as f32;
                let scaled = (configured as f32 * scale * (1.0 + synapses / 10.0)).round() as usize;
                scaled.clamp(min, max)
            }
            AttemptPolicy::NSizeProportional { power } => {
                let neurons = genome.neurons().len() as f32;
                20 + (neurons.powf(power).round() as usize).min(100)
            }
            AttemptPolicy::WSizeProportional { power } => {
                let synapses = genome.synapses().len() as f32;
                10 + (synapses.powf(power).round() as usize).min(100)
            }
        }
    }
}
