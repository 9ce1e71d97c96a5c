use crate::evaluate::ScoredGenome;
use crate::genome::Genome;
use cortica_error::{CorticaError, CorticaResult, cortica_err, ensure};
use hashbrown::{HashMap, HashSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How genomes are bucketed into species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpecieIdentifier {
    /// Canonical hash of neuron/synapse structure, ignoring weights and
    /// function tags.
    #[default]
    Topology,
    /// Neuron-count bucket.
    TotN,
    /// Topology hash that also folds in the activation distribution.
    Fingerprint,
}

impl SpecieIdentifier {
    pub fn tag(&self) -> &'static str {
        match self {
            SpecieIdentifier::Topology => "topology",
            SpecieIdentifier::TotN => "tot_n",
            SpecieIdentifier::Fingerprint => "fingerprint",
        }
    }

    /// Deterministic species key for a genome.
    pub fn key_for(&self, genome: &Genome) -> SpecieKey {
        match self {
            SpecieIdentifier::Topology => SpecieKey(format!("t:{}", genome.structure_key())),
            SpecieIdentifier::TotN => SpecieKey(format!("n:{:06}", genome.neurons().len())),
            SpecieIdentifier::Fingerprint => SpecieKey(format!("f:{}", genome.fingerprint())),
        }
    }
}

impl FromStr for SpecieIdentifier {
    type Err = CorticaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topology" => Ok(SpecieIdentifier::Topology),
            "tot_n" => Ok(SpecieIdentifier::TotN),
            "fingerprint" => Ok(SpecieIdentifier::Fingerprint),
            other => Err(cortica_err!(InvalidConfig: "unknown specie identifier {:?}", other)),
        }
    }
}

/// Stable textual key identifying one species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpecieKey(pub String);

impl std::fmt::Display for SpecieKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One species in one generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpecieRecord {
    pub key: SpecieKey,
    pub size: usize,
    pub mean_fitness: f32,
    pub best_fitness: f32,
    /// Size in the previous generation, if the species existed then.
    pub prev_size: Option<usize>,
}

/// Species present in one generation plus birth/extinction deltas against
/// the previous one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerationSpecies {
    pub generation: usize,
    pub records: Vec<SpecieRecord>,
    pub new_keys: Vec<SpecieKey>,
    pub extinct_keys: Vec<SpecieKey>,
}

impl GenerationSpecies {
    pub fn keys(&self) -> impl Iterator<Item = &SpecieKey> {
        self.records.iter().map(|r| &r.key)
    }

    pub fn record(&self, key: &SpecieKey) -> Option<&SpecieRecord> {
        self.records.iter().find(|r| &r.key == key)
    }
}

/// Aggregates derived per generation alongside the species records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeciationMetrics {
    pub species_count: usize,
    pub fingerprint_diversity: usize,
    pub mean_species_size: f32,
    pub largest_species_size: usize,
}

/// Every generation's species record, retained for the lifetime of the run.
/// A key may disappear and later reappear; the reappearance is a fresh
/// birth event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeciesHistory {
    generations: Vec<GenerationSpecies>,
}

impl SpeciesHistory {
    pub fn new() -> Self {
        SpeciesHistory::default()
    }

    pub fn push(&mut self, generation: GenerationSpecies) {
        self.generations.push(generation);
    }

    pub fn latest(&self) -> Option<&GenerationSpecies> {
        self.generations.last()
    }

    pub fn generations(&self) -> &[GenerationSpecies] {
        &self.generations
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Splice another history in front of this one, renumbering nothing:
    /// continuation runs carry their snapshot's generation numbering.
    pub fn prepend(&mut self, mut earlier: SpeciesHistory) {
        std::mem::swap(&mut self.generations, &mut earlier.generations);
        self.generations.extend(earlier.generations);
    }
}

/// Signed per-species deltas between two generations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpecieChange {
    pub key: SpecieKey,
    pub size_delta: i64,
    pub mean_delta: f32,
    pub best_delta: f32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeciesDiff {
    pub added: Vec<SpecieKey>,
    pub removed: Vec<SpecieKey>,
    pub changed: Vec<SpecieChange>,
    pub unchanged: usize,
}

/// Partition a scored population into species.
///
/// Clustering is deterministic: genomes group by identifier key and keys
/// sort lexicographically. Birth/extinction lists come from comparing the
/// key set with `previous`.
pub fn speciate(
    population: &[ScoredGenome],
    identifier: &SpecieIdentifier,
    generation: usize,
    previous: Option<&GenerationSpecies>,
) -> (SpeciationMetrics, GenerationSpecies) {
    let mut buckets: HashMap<SpecieKey, Vec<f32>> = HashMap::new();
    for scored in population {
        buckets
            .entry(identifier.key_for(&scored.genome))
            .or_default()
            .push(scored.fitness);
    }

    let mut keys = buckets.keys().cloned().collect::<Vec<_>>();
    keys.sort();

    let prev_sizes: HashMap<&SpecieKey, usize> = previous
        .map(|prev| prev.records.iter().map(|r| (&r.key, r.size)).collect())
        .unwrap_or_default();

    let mut records = Vec::with_capacity(keys.len());
    for key in &keys {
        let fitnesses = &buckets[key];
        let best = fitnesses.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = fitnesses.iter().sum::<f32>() / fitnesses.len() as f32;

        records.push(SpecieRecord {
            key: key.clone(),
            size: fitnesses.len(),
            mean_fitness: mean,
            best_fitness: best,
            prev_size: prev_sizes.get(key).copied(),
        });
    }

    let new_keys = keys
        .iter()
        .filter(|k| !prev_sizes.contains_key(*k))
        .cloned()
        .collect::<Vec<_>>();

    let current: HashSet<&SpecieKey> = keys.iter().collect();
    let mut extinct_keys = previous
        .map(|prev| {
            prev.records
                .iter()
                .map(|r| r.key.clone())
                .filter(|k| !current.contains(k))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    extinct_keys.sort();

    let fingerprints: HashSet<String> = population
        .iter()
        .map(|s| s.genome.fingerprint())
        .collect();

    let largest = records.iter().map(|r| r.size).max().unwrap_or(0);
    let metrics = SpeciationMetrics {
        species_count: records.len(),
        fingerprint_diversity: fingerprints.len(),
        mean_species_size: if records.is_empty() {
            0.0
        } else {
            population.len() as f32 / records.len() as f32
        },
        largest_species_size: largest,
    };

    (
        metrics,
        GenerationSpecies {
            generation,
            records,
            new_keys,
            extinct_keys,
        },
    )
}

/// Extinction diff between two consecutive generation records.
///
/// Keys present in both generations land in `changed` when any of size,
/// mean or best moved, otherwise they count as `unchanged`.
pub fn diff(previous: &GenerationSpecies, current: &GenerationSpecies) -> SpeciesDiff {
    let prev: HashMap<&SpecieKey, &SpecieRecord> =
        previous.records.iter().map(|r| (&r.key, r)).collect();
    let curr: HashMap<&SpecieKey, &SpecieRecord> =
        current.records.iter().map(|r| (&r.key, r)).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    let mut unchanged = 0usize;

    for record in &current.records {
        match prev.get(&record.key) {
            None => added.push(record.key.clone()),
            Some(before) => {
                let size_delta = record.size as i64 - before.size as i64;
                let mean_delta = record.mean_fitness - before.mean_fitness;
                let best_delta = record.best_fitness - before.best_fitness;

                if size_delta != 0 || mean_delta != 0.0 || best_delta != 0.0 {
                    changed.push(SpecieChange {
                        key: record.key.clone(),
                        size_delta,
                        mean_delta,
                        best_delta,
                    });
                } else {
                    unchanged += 1;
                }
            }
        }
    }

    let mut removed = previous
        .records
        .iter()
        .map(|r| r.key.clone())
        .filter(|k| !curr.contains_key(k))
        .collect::<Vec<_>>();
    removed.sort();

    SpeciesDiff {
        added,
        removed,
        changed,
        unchanged,
    }
}

/// Rewrites raw fitness after speciation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitnessPostprocessor {
    #[default]
    None,
    /// Explicit fitness sharing: fitness divides by current species size.
    SizeProportional,
    /// Fitness scales with fingerprint rarity:
    /// `fitness * (1 + alpha * (1 - freq))`.
    NoveltyProportional { alpha: f32 },
}

impl FitnessPostprocessor {
    pub const NOVELTY_ALPHA: f32 = 0.5;

    /// Parse a postprocessor name. `nsize_proportional` is accepted as a
    /// legacy alias of `size_proportional`; the second return slot flags it
    /// so callers can emit a deprecation note.
    pub fn parse(name: &str) -> CorticaResult<(Self, bool)> {
        match name {
            "none" => Ok((FitnessPostprocessor::None, false)),
            "size_proportional" => Ok((FitnessPostprocessor::SizeProportional, false)),
            "nsize_proportional" => Ok((FitnessPostprocessor::SizeProportional, true)),
            "novelty_proportional" => Ok((
                FitnessPostprocessor::NoveltyProportional {
                    alpha: Self::NOVELTY_ALPHA,
                },
                false,
            )),
            other => Err(cortica_err!(InvalidConfig: "unknown fitness postprocessor {:?}", other)),
        }
    }

    /// Rewrite fitness in place. Relative order within a species is
    /// preserved by construction for the sharing variant, which keeps ties
    /// resolved by original fitness order.
    pub fn apply(
        &self,
        population: &mut [ScoredGenome],
        identifier: &SpecieIdentifier,
    ) -> CorticaResult<()> {
        match self {
            FitnessPostprocessor::None => Ok(()),
            FitnessPostprocessor::SizeProportional => {
                let mut sizes: HashMap<SpecieKey, usize> = HashMap::new();
                for scored in population.iter() {
                    *sizes.entry(identifier.key_for(&scored.genome)).or_insert(0) += 1;
                }

                for scored in population.iter_mut() {
                    let size = sizes[&identifier.key_for(&scored.genome)];
                    scored.fitness /= size as f32;
                }
                Ok(())
            }
            FitnessPostprocessor::NoveltyProportional { alpha } => {
                ensure!(
                    alpha.is_finite() && *alpha >= 0.0,
                    InvalidConfig: "novelty coefficient must be non-negative, got {}", alpha
                );

                let total = population.len() as f32;
                let mut counts: HashMap<String, usize> = HashMap::new();
                for scored in population.iter() {
                    *counts.entry(scored.genome.fingerprint()).or_insert(0) += 1;
                }

                for scored in population.iter_mut() {
                    let freq = counts[&scored.genome.fingerprint()] as f32 / total;
                    scored.fitness *= 1.0 + alpha * (1.0 - freq);
                }
                Ok(())
            }
        }
    }
}
