mod utilities;

#[cfg(test)]
mod selector_tests {
    use crate::utilities::population_utils;
    use cortica_core::*;
    use cortica_selectors::*;
    use rstest::*;

    #[rstest]
    #[case(10)]
    #[case(20)]
    #[case(30)]
    fn elite_selector_selects_the_best(#[case] num: usize) {
        let population = population_utils::graded_population(100);
        let identifier = SpecieIdentifier::TotN;
        let ctx = SelectionContext::bare(&identifier);

        let selected = EliteSelector::new().select(&population, &ctx, num);

        assert_eq!(selected.len(), num);
        for (i, scored) in selected.iter().enumerate() {
            assert_eq!(scored.fitness, (99 - i) as f32);
        }
    }

    #[rstest]
    #[case(3)]
    #[case(5)]
    fn top_k_cycles_the_best(#[case] k: usize) {
        let population = population_utils::graded_population(50);
        let identifier = SpecieIdentifier::TotN;
        let ctx = SelectionContext::bare(&identifier);

        let selected = TopKSelector::new(k).select(&population, &ctx, 10);

        assert_eq!(selected.len(), 10);
        let floor = (50 - k) as f32;
        assert!(selected.iter().all(|s| s.fitness >= floor));
    }

    #[rstest]
    #[case(TournamentSelector::new(3), 80)]
    #[case(RankSelector::new(), 80)]
    #[case(SpeciesTournamentSelector::new(3), 80)]
    #[case(SharedTournamentSelector::new(3, 15), 80)]
    fn probability_selectors_beat_random(#[case] selector: impl Select, #[case] count: usize) {
        let population = population_utils::two_species_population(100);
        let identifier = SpecieIdentifier::TotN;
        let ctx = SelectionContext::bare(&identifier);
        let random_selector = RandomSelector::new();

        let trials = 200;
        let mut better_than_random = 0;

        random_provider::scoped_seed(3, || {
            for _ in 0..trials {
                let selected = selector.select(&population, &ctx, count);
                let random_selected = random_selector.select(&population, &ctx, count);

                assert_eq!(selected.len(), count);
                assert_eq!(random_selected.len(), count);

                if population_utils::mean_fitness(&selected)
                    > population_utils::mean_fitness(&random_selected)
                {
                    better_than_random += 1;
                }
            }
        });

        assert!(
            better_than_random > trials / 2,
            "selector beat random only {better_than_random}/{trials} times"
        );
    }

    #[test]
    fn efficiency_selector_prefers_lean_genomes() {
        let population = population_utils::two_species_population(40);
        let identifier = SpecieIdentifier::TotN;
        let ctx = SelectionContext::bare(&identifier);

        let selected = EfficiencySelector::new().select(&population, &ctx, 5);
        assert_eq!(selected.len(), 5);

        // The top efficiency pick must dominate the worst genome outright.
        let worst = population
            .iter()
            .map(|s| s.fitness)
            .fold(f32::INFINITY, f32::min);
        assert!(selected[0].fitness > worst);
    }

    #[test]
    fn shared_tournament_drops_stagnant_species() {
        let population = population_utils::two_species_population(40);
        let identifier = SpecieIdentifier::TotN;

        // The 2-input species (even indices) is long stagnant; the best
        // genome (index 39, odd) sits in the other species.
        let mut stagnation = hashbrown::HashMap::new();
        stagnation.insert(identifier.key_for(&population[0].genome), 100usize);

        let ctx = SelectionContext::new(&identifier, None, Some(&stagnation));
        let selected = random_provider::scoped_seed(5, || {
            SharedTournamentSelector::new(3, 15).select(&population, &ctx, 30)
        });

        let stagnant_key = identifier.key_for(&population[0].genome);
        assert!(
            selected
                .iter()
                .all(|s| identifier.key_for(&s.genome) != stagnant_key)
        );
    }

    #[rstest]
    #[case("elite")]
    #[case("hof_elite")]
    #[case("tournament")]
    #[case("species_tournament")]
    #[case("shared_tournament")]
    #[case("rank")]
    #[case("top_k")]
    #[case("efficiency")]
    #[case("random")]
    #[case("hof_tournament")]
    fn selector_names_parse(#[case] name: &str) {
        assert!(parse_selector(name).is_ok());
    }

    #[test]
    fn unknown_selector_is_invalid_config() {
        let err = parse_selector("roulette_wheel_of_misfortune").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }
}
