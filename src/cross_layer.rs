//! Cross-region contact layers.
//!
//! Synthesis picks a share of each of two regions as crossers and links every
//! crosser to agents of the other region who stay home. In single-layer mode
//! the result is one `cross` layer; in multilayer mode crossers also get a
//! [`TravelPurpose`] and their contacts are routed into `cross_work`,
//! `cross_community` and `cross_home`. All edges are static: whether an edge is
//! live on a given day is decided by the mobility machine.
use std::ops::Range;

use log::{info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::IxaError;
use crate::network::{ContactLayer, LayerKey};
use crate::people::{PeopleData, PersonId, RegionId, TravelPurpose};
use crate::population::{apportion, Population};
use crate::random::{sample_multiple_from_known_length, sample_with_replacement};

fn default_traveler_fraction() -> f64 {
    0.1
}

fn default_cross_weight() -> f32 {
    0.6
}

fn default_working_ages() -> [u8; 2] {
    [22, 65]
}

/// Relative shares of crossers per purpose.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct PurposeFractions {
    pub work: f64,
    pub visit: f64,
    pub undocumented: f64,
}

impl PurposeFractions {
    fn as_weights(self) -> [f64; 3] {
        [self.work, self.visit, self.undocumented]
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MultilayerConfig {
    pub purposes: PurposeFractions,
    #[serde(default = "default_cross_weight")]
    pub work_weight: f32,
    #[serde(default = "default_cross_weight")]
    pub community_weight: f32,
    #[serde(default = "default_cross_weight")]
    pub home_weight: f32,
    /// `cross_work` partners are drawn from non-crossers aged `[min, max)`
    #[serde(default = "default_working_ages")]
    pub working_ages: [u8; 2],
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CrossLayerConfig {
    /// Share `f` of each region that becomes a crosser
    #[serde(default = "default_traveler_fraction")]
    pub traveler_fraction: f64,
    /// Contacts `k` drawn for each crosser in each layer
    pub edges_per_traveler: usize,
    /// Weight of the single `cross` layer
    #[serde(default = "default_cross_weight")]
    pub weight: f32,
    #[serde(default)]
    pub region_a: Option<String>,
    #[serde(default)]
    pub region_b: Option<String>,
    pub seed: u64,
    /// Purpose-routed layers instead of the single `cross` layer
    #[serde(default)]
    pub multilayer: Option<MultilayerConfig>,
}

impl CrossLayerConfig {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), IxaError> {
        if !(0.0..=1.0).contains(&self.traveler_fraction) {
            return Err(IxaError::config(format!(
                "traveler fraction must be in [0, 1], got {}",
                self.traveler_fraction
            )));
        }
        if self.edges_per_traveler == 0 {
            return Err(IxaError::config("edges per traveler must be positive"));
        }
        if self.region_a.is_some() != self.region_b.is_some() {
            return Err(IxaError::config("region_a and region_b must be given together"));
        }
        if self.region_a.is_some() && self.region_a == self.region_b {
            return Err(IxaError::config("region_a and region_b must differ"));
        }
        let mut weights = vec![self.weight];
        if let Some(multilayer) = &self.multilayer {
            let fractions = multilayer.purposes.as_weights();
            if fractions.iter().any(|f| !f.is_finite() || *f < 0.0)
                || fractions.iter().sum::<f64>() <= 0.0
            {
                return Err(IxaError::config(
                    "purpose fractions must be non-negative with a positive total",
                ));
            }
            let [min, max] = multilayer.working_ages;
            if min >= max {
                return Err(IxaError::config(format!("empty working age range [{min}, {max})")));
            }
            weights.extend([
                multilayer.work_weight,
                multilayer.community_weight,
                multilayer.home_weight,
            ]);
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(IxaError::config("cross layer weights must be non-negative"));
        }
        Ok(())
    }
}

/// What synthesis produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CrossLayerSummary {
    /// Crossers per region
    pub crossers: Vec<(String, usize)>,
    /// Crossers per region and purpose (multilayer mode only)
    pub purposes: Vec<(String, TravelPurpose, usize)>,
    /// Edges per emitted layer
    pub layers: Vec<(LayerKey, usize)>,
}

/// One side of the border: its crossers and the agents who stay.
struct Side {
    region: RegionId,
    crossers: Vec<PersonId>,
    stayers: Vec<PersonId>,
}

fn choose_regions(
    people: &PeopleData,
    config: &CrossLayerConfig,
) -> Result<Option<(RegionId, RegionId)>, IxaError> {
    let regions = people.regions();
    let populated = |region: RegionId| people.iter().any(|p| people.country(p) == region);

    if let (Some(a), Some(b)) = (&config.region_a, &config.region_b) {
        let mut ids = [RegionId(0); 2];
        for (slot, name) in ids.iter_mut().zip([a, b]) {
            *slot = regions
                .id_of(name)
                .filter(|&region| populated(region))
                .ok_or_else(|| IxaError::config(format!("region {name} is unknown or empty")))?;
        }
        return Ok(Some((ids[0], ids[1])));
    }

    let mut candidates = regions.iter().filter(|&region| populated(region));
    match (candidates.next(), candidates.next()) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        _ => Ok(None),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn crosser_count(fraction: f64, n: usize) -> usize {
    ((fraction * n as f64).floor() as usize).max(1).min(n)
}

fn link(
    rng: &mut SmallRng,
    layer: &mut ContactLayer,
    crossers: &[PersonId],
    pool: &[PersonId],
    k: usize,
) -> Result<(), IxaError> {
    let weight = layer.nominal_weight();
    for &crosser in crossers {
        for partner in sample_with_replacement(rng, pool, k) {
            layer.add_edge(crosser, partner, weight)?;
        }
    }
    Ok(())
}

fn emit(
    population: &mut Population,
    summary: &mut CrossLayerSummary,
    layer: ContactLayer,
) -> Result<(), IxaError> {
    if layer.is_empty() {
        warn!("cross layer {} has no edges and is not added", layer.key());
        return Ok(());
    }
    info!("cross layer {} has {} edges", layer.key(), layer.len());
    summary.layers.push((layer.key().clone(), layer.len()));
    population.network.add_layer(layer)
}

/// Picks crossers and adds the cross-region layers to `population`.
///
/// With fewer than two populated regions (and no explicit region pair) this
/// logs and returns an empty summary.
///
/// # Errors
/// Returns `IxaError::ConfigurationError` if the config does not validate,
/// names an unknown or empty region, or crossers were already chosen.
pub fn synthesize_cross_layers(
    population: &mut Population,
    config: &CrossLayerConfig,
) -> Result<CrossLayerSummary, IxaError> {
    config.validate()?;
    let people = &population.people;
    if people.iter().any(|p| people.is_crosser(p)) {
        return Err(IxaError::config("cross layers were already synthesized"));
    }
    let Some((region_a, region_b)) = choose_regions(people, config)? else {
        info!("fewer than two populated regions, no cross layers added");
        return Ok(CrossLayerSummary::default());
    };

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut sides = Vec::with_capacity(2);
    for region in [region_a, region_b] {
        let members = people.people_from(region);
        let count = crosser_count(config.traveler_fraction, members.len());
        let crossers = sample_multiple_from_known_length(&mut rng, members.iter().copied(), count);
        let stayers = members
            .iter()
            .copied()
            .filter(|p| crossers.binary_search(p).is_err())
            .collect();
        sides.push(Side {
            region,
            crossers,
            stayers,
        });
    }

    let mut summary = CrossLayerSummary::default();
    for side in &sides {
        summary
            .crossers
            .push((people.regions().name(side.region).to_string(), side.crossers.len()));
    }

    match &config.multilayer {
        None => {
            for side in &sides {
                for &crosser in &side.crossers {
                    population.people.mark_crosser(crosser, None);
                }
            }
            let mut layer = ContactLayer::new(LayerKey::Cross, config.weight)?;
            for (side, other) in [(&sides[0], &sides[1]), (&sides[1], &sides[0])] {
                if other.stayers.is_empty() {
                    warn!("no non-crossers left in region {}", other.region);
                }
                link(&mut rng, &mut layer, &side.crossers, &other.stayers, config.edges_per_traveler)?;
            }
            emit(population, &mut summary, layer)?;
        }
        Some(multilayer) => {
            synthesize_multilayer(population, config, multilayer, &mut sides, &mut rng, &mut summary)?;
        }
    }
    Ok(summary)
}

fn working_age_pool(people: &PeopleData, stayers: &[PersonId], ages: &Range<u8>) -> Vec<PersonId> {
    let pool: Vec<PersonId> = stayers
        .iter()
        .copied()
        .filter(|&p| ages.contains(&people.age(p)))
        .collect();
    if pool.is_empty() {
        warn!("no working-age non-crossers, cross_work uses every non-crosser");
        return stayers.to_vec();
    }
    pool
}

fn synthesize_multilayer(
    population: &mut Population,
    config: &CrossLayerConfig,
    multilayer: &MultilayerConfig,
    sides: &mut [Side],
    rng: &mut SmallRng,
    summary: &mut CrossLayerSummary,
) -> Result<(), IxaError> {
    let fractions = multilayer.purposes.as_weights();
    let k = config.edges_per_traveler;
    let [min_age, max_age] = multilayer.working_ages;

    // (crossers, purposes) per side, in the same order
    let mut purposes: Vec<Vec<TravelPurpose>> = Vec::with_capacity(sides.len());
    for side in sides.iter_mut() {
        side.crossers.shuffle(rng);
        let counts = apportion(side.crossers.len(), &fractions);
        let assigned: Vec<TravelPurpose> = TravelPurpose::ALL
            .iter()
            .zip(&counts)
            .flat_map(|(&purpose, &count)| std::iter::repeat_n(purpose, count))
            .collect();
        let region_name = population.people.regions().name(side.region).to_string();
        for (&purpose, &count) in TravelPurpose::ALL.iter().zip(&counts) {
            summary.purposes.push((region_name.clone(), purpose, count));
        }
        for (&crosser, &purpose) in side.crossers.iter().zip(&assigned) {
            population.people.mark_crosser(crosser, Some(purpose));
        }
        purposes.push(assigned);
    }

    let with_purpose = |side: usize, wanted: TravelPurpose| -> Vec<PersonId> {
        sides[side]
            .crossers
            .iter()
            .zip(&purposes[side])
            .filter(|(_, &purpose)| purpose == wanted)
            .map(|(&crosser, _)| crosser)
            .collect()
    };

    let mut work = ContactLayer::new(LayerKey::CrossWork, multilayer.work_weight)?;
    let mut community = ContactLayer::new(LayerKey::CrossCommunity, multilayer.community_weight)?;
    let mut home = ContactLayer::new(LayerKey::CrossHome, multilayer.home_weight)?;
    for (side, other) in [(0, 1), (1, 0)] {
        let stayers = &sides[other].stayers;
        let workers = working_age_pool(&population.people, stayers, &(min_age..max_age));
        link(rng, &mut work, &with_purpose(side, TravelPurpose::Work), &workers, k)?;
        link(rng, &mut community, &sides[side].crossers, stayers, k)?;
        link(rng, &mut home, &with_purpose(side, TravelPurpose::Visit), stayers, k)?;
    }
    for layer in [work, community, home] {
        emit(population, summary, layer)?;
    }
    Ok(())
}
