//! Synthetic multi-region populations.
//!
//! [`build_population`] is a pure function of its [`PopulationConfig`]: it
//! apportions agents to regions, draws their demographics, and generates every
//! configured contact layer independently inside each region. The resulting
//! [`Population`] is then (optionally) passed through cross-layer synthesis
//! and handed to a `Context` with [`ContextPopulationExt::install_population`].
mod topology;

use std::ops::Range;

use indexmap::IndexMap;
use log::{debug, info, warn};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

pub use topology::{LocalGraph, Topology, TopologyKind};

use crate::error::IxaError;
use crate::network::{install_network, ContactLayer, LayerKey, Network};
use crate::people::{install_people, ContextPeopleExt, PeopleData, PersonId, RegionId, RegionRegistry, Sex};
use crate::{define_data_plugin, Context};

/// Ages in `[min, max)` drawn with relative probability `weight`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AgeBracket {
    pub min: u8,
    pub max: u8,
    pub weight: f64,
}

fn default_age_brackets() -> Vec<AgeBracket> {
    (0..10)
        .map(|decade| AgeBracket {
            min: decade * 10,
            max: decade * 10 + 10,
            weight: 1.0,
        })
        .collect()
}

fn default_layer_weight() -> f32 {
    1.0
}

/// How one region-internal layer is generated.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LayerSpec {
    pub name: LayerKey,
    /// One of `preferential_attachment`, `uniform_random`, `clustered` (or
    /// their aliases `scale_free`, `random`, `microstructured`)
    pub kind: String,
    /// `m` for preferential attachment, `k` for uniform random
    #[serde(default)]
    pub connectivity: Option<f64>,
    /// Mean cluster size for clustered layers
    #[serde(default)]
    pub cluster_size: Option<f64>,
    /// Only agents with `min <= age < max` take part
    #[serde(default)]
    pub age_range: Option<[u8; 2]>,
    /// The per-layer transmission multiplier
    #[serde(default = "default_layer_weight")]
    pub weight: f32,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_count(layer: &LayerKey, value: Option<f64>, what: &str) -> Result<usize, IxaError> {
    match value {
        Some(v) if v >= 1.0 && v.fract() == 0.0 && v.is_finite() => Ok(v as usize),
        Some(v) => Err(IxaError::config(format!(
            "layer {layer}: {what} must be a positive integer, got {v}"
        ))),
        None => Err(IxaError::config(format!("layer {layer}: missing {what}"))),
    }
}

impl LayerSpec {
    /// Parses the kind and checks its parameter.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` for an unknown kind or a missing
    /// or invalid parameter.
    pub fn topology(&self) -> Result<Topology, IxaError> {
        match self.kind.parse::<TopologyKind>()? {
            TopologyKind::PreferentialAttachment => Ok(Topology::PreferentialAttachment {
                m: positive_count(&self.name, self.connectivity, "connectivity")?,
            }),
            TopologyKind::UniformRandom => Ok(Topology::UniformRandom {
                k: positive_count(&self.name, self.connectivity, "connectivity")?,
            }),
            TopologyKind::Clustered => {
                let size = self.cluster_size.or(self.connectivity);
                match size {
                    Some(c) if c.is_finite() && c >= 1.0 => Ok(Topology::Clustered { mean_size: c }),
                    Some(c) => Err(IxaError::config(format!(
                        "layer {}: cluster size must be at least 1, got {c}",
                        self.name
                    ))),
                    None => Err(IxaError::config(format!(
                        "layer {}: missing cluster size",
                        self.name
                    ))),
                }
            }
        }
    }

    /// # Errors
    /// Returns `IxaError::ConfigurationError` if the range is empty.
    pub fn age_filter(&self) -> Result<Option<Range<u8>>, IxaError> {
        match self.age_range {
            None => Ok(None),
            Some([min, max]) if min < max => Ok(Some(min..max)),
            Some([min, max]) => Err(IxaError::config(format!(
                "layer {}: empty age range [{min}, {max})",
                self.name
            ))),
        }
    }

    fn validate(&self) -> Result<(), IxaError> {
        if self.name.is_cross() {
            return Err(IxaError::config(format!(
                "{} is reserved for cross-region layers",
                self.name
            )));
        }
        self.topology()?;
        self.age_filter()?;
        ContactLayer::new(self.name.clone(), self.weight)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PopulationConfig {
    pub size: usize,
    pub seed: u64,
    /// Relative weights (or counts) per region name
    pub regions: IndexMap<String, f64>,
    pub layers: Vec<LayerSpec>,
    #[serde(default = "default_age_brackets")]
    pub age_brackets: Vec<AgeBracket>,
}

impl PopulationConfig {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), IxaError> {
        if self.size == 0 {
            return Err(IxaError::config("population size must be positive"));
        }
        if self.regions.is_empty() {
            return Err(IxaError::config("at least one region is required"));
        }
        if self
            .regions
            .values()
            .any(|weight| !weight.is_finite() || *weight < 0.0)
            || self.regions.values().sum::<f64>() <= 0.0
        {
            return Err(IxaError::config(
                "region proportions must be non-negative with a positive total",
            ));
        }
        if self.age_brackets.is_empty()
            || self
                .age_brackets
                .iter()
                .any(|b| b.min >= b.max || !b.weight.is_finite() || b.weight < 0.0)
            || self.age_brackets.iter().map(|b| b.weight).sum::<f64>() <= 0.0
        {
            return Err(IxaError::config("invalid age brackets"));
        }
        let mut names = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            layer.validate()?;
            if names.contains(&&layer.name) {
                return Err(IxaError::config(format!("duplicate layer key {}", layer.name)));
            }
            names.push(&layer.name);
        }
        Ok(())
    }
}

/// Splits `total` into integer shares proportional to `weights`, handing the
/// leftover units to the largest fractional parts (earliest first on ties).
#[must_use]
pub fn apportion(total: usize, weights: &[f64]) -> Vec<usize> {
    let sum: f64 = weights.iter().sum();
    if weights.is_empty() || sum <= 0.0 {
        return vec![0; weights.len()];
    }
    #[allow(clippy::cast_precision_loss)]
    let quotas: Vec<f64> = weights.iter().map(|w| total as f64 * w / sum).collect();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut counts: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let assigned: usize = counts.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &index in order.iter().take(total.saturating_sub(assigned)) {
        counts[index] += 1;
    }
    counts
}

/// The output of [`build_population`].
#[derive(Clone, Debug, PartialEq)]
pub struct Population {
    pub(crate) people: PeopleData,
    pub(crate) network: Network,
    pub(crate) clusters: IndexMap<LayerKey, Vec<Vec<PersonId>>>,
}

impl Population {
    #[must_use]
    pub fn people(&self) -> &PeopleData {
        &self.people
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The cluster partition of a clustered layer.
    #[must_use]
    pub fn clusters(&self, layer: &LayerKey) -> Option<&[Vec<PersonId>]> {
        self.clusters.get(layer).map(Vec::as_slice)
    }
}

fn eligible_in_region(
    people: &PeopleData,
    members: &[PersonId],
    ages: Option<&Range<u8>>,
    layer: &LayerKey,
    region: RegionId,
) -> Vec<PersonId> {
    let Some(ages) = ages else {
        return members.to_vec();
    };
    let eligible: Vec<PersonId> = members
        .iter()
        .copied()
        .filter(|&p| ages.contains(&people.age(p)))
        .collect();
    if eligible.is_empty() && !members.is_empty() {
        warn!(
            "layer {layer}: no agents aged {}..{} in region {}, using the whole region",
            ages.start,
            ages.end,
            people.regions().name(region)
        );
        return members.to_vec();
    }
    eligible
}

/// Builds agents and region-internal layers.
///
/// # Errors
/// Returns `IxaError::ConfigurationError` if the config does not validate.
pub fn build_population(config: &PopulationConfig) -> Result<Population, IxaError> {
    config.validate()?;
    let mut rng = SmallRng::seed_from_u64(config.seed);

    let mut regions = RegionRegistry::new();
    let region_ids: Vec<RegionId> = config.regions.keys().map(|name| regions.register(name)).collect();
    let weights: Vec<f64> = config.regions.values().copied().collect();
    let counts = apportion(config.size, &weights);

    let mut labels: Vec<RegionId> = region_ids
        .iter()
        .zip(&counts)
        .flat_map(|(&region, &count)| std::iter::repeat_n(region, count))
        .collect();
    labels.shuffle(&mut rng);

    let bracket_weights: Vec<f64> = config.age_brackets.iter().map(|b| b.weight).collect();
    let brackets = WeightedIndex::new(&bracket_weights)
        .map_err(|error| IxaError::config(format!("invalid age brackets: {error}")))?;

    let mut people = PeopleData::new(regions);
    for country in labels {
        let bracket = &config.age_brackets[brackets.sample(&mut rng)];
        let age = rng.random_range(bracket.min..bracket.max);
        let sex = if rng.random_bool(0.5) {
            Sex::Female
        } else {
            Sex::Male
        };
        people.add_person(age, sex, country);
    }
    for (region, count) in region_ids.iter().zip(&counts) {
        info!(
            "region {} has {count} agents",
            people.regions().name(*region)
        );
    }

    let members: Vec<Vec<PersonId>> = region_ids.iter().map(|&r| people.people_from(r)).collect();
    let mut network = Network::default();
    let mut clusters = IndexMap::new();
    for spec in &config.layers {
        let topology = spec.topology()?;
        let ages = spec.age_filter()?;
        let mut layer = ContactLayer::new(spec.name.clone(), spec.weight)?;
        let mut layer_clusters = Vec::new();

        for (&region, region_members) in region_ids.iter().zip(&members) {
            let eligible = eligible_in_region(&people, region_members, ages.as_ref(), &spec.name, region);
            let graph = topology.generate(&mut rng, eligible.len());
            for (a, b) in graph.edges {
                layer.add_edge(eligible[a], eligible[b], 1.0)?;
            }
            layer_clusters.extend(
                graph
                    .clusters
                    .into_iter()
                    .map(|cluster| cluster.into_iter().map(|i| eligible[i]).collect::<Vec<_>>()),
            );
        }

        debug!("layer {} has {} edges", spec.name, layer.len());
        if matches!(topology, Topology::Clustered { .. }) {
            clusters.insert(spec.name.clone(), layer_clusters);
        }
        network.add_layer(layer)?;
    }

    Ok(Population {
        people,
        network,
        clusters,
    })
}

define_data_plugin!(
    ClusterPlugin,
    IndexMap<LayerKey, Vec<Vec<PersonId>>>,
    IndexMap::new()
);

pub trait ContextPopulationExt {
    /// Makes `population` the context's people and network.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if a population is already installed.
    fn install_population(&mut self, population: Population) -> Result<(), IxaError>;

    /// Checks the installed population against the size the host expects.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` on a mismatch.
    fn check_population_size(&self, expected: usize) -> Result<(), IxaError>;

    fn get_layer_clusters(&self, layer: &LayerKey) -> Option<&[Vec<PersonId>]>;
}

impl ContextPopulationExt for Context {
    fn install_population(&mut self, population: Population) -> Result<(), IxaError> {
        if !self.people().is_empty() {
            return Err(IxaError::config("a population is already installed"));
        }
        info!(
            "installing {} agents and {} layers",
            population.people.len(),
            population.network.len()
        );
        install_people(self, population.people);
        install_network(self, population.network);
        *self.get_data_mut(ClusterPlugin) = population.clusters;
        Ok(())
    }

    fn check_population_size(&self, expected: usize) -> Result<(), IxaError> {
        let actual = self.get_current_population();
        if actual != expected {
            return Err(IxaError::config(format!(
                "population has {actual} agents but the host expects {expected}"
            )));
        }
        Ok(())
    }

    fn get_layer_clusters(&self, layer: &LayerKey) -> Option<&[Vec<PersonId>]> {
        self.get_data(ClusterPlugin)?.get(layer).map(Vec::as_slice)
    }
}
