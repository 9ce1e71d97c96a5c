use cortica_core::*;

/// Population of seed genomes scored by index: genome i has fitness i.
#[allow(dead_code)]
pub fn graded_population(num: usize) -> Vec<ScoredGenome> {
    let mut ids = IdSource::new();

    random_provider::scoped_seed(97, || {
        (0..num)
            .map(|i| ScoredGenome::new(Genome::seed(2, 1, &mut ids), i as f32))
            .collect()
    })
}

/// Population split across two species by neuron count, fitness by index.
#[allow(dead_code)]
pub fn two_species_population(num: usize) -> Vec<ScoredGenome> {
    let mut ids = IdSource::new();

    random_provider::scoped_seed(101, || {
        (0..num)
            .map(|i| {
                let inputs = if i % 2 == 0 { 2 } else { 3 };
                ScoredGenome::new(Genome::seed(inputs, 1, &mut ids), i as f32)
            })
            .collect()
    })
}

#[allow(dead_code)]
pub fn mean_fitness(population: &[ScoredGenome]) -> f32 {
    population.iter().map(|s| s.fitness).sum::<f32>() / population.len() as f32
}
