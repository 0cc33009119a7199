use std::convert::Infallible;
use std::fmt::{self, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::IxaError;
use crate::people::{PersonId, TravelPurpose};

/// The name of a contact layer.
///
/// Region-internal layers (`base`, `home`, `school`, `work`, `community` or
/// any custom name) only connect agents from the same country. Cross-region
/// layers connect a crosser with agents of the other region.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LayerKey {
    Base,
    Home,
    School,
    Work,
    Community,
    Custom(String),
    Cross,
    CrossWork,
    CrossCommunity,
    CrossHome,
}

impl LayerKey {
    #[must_use]
    pub fn is_cross(&self) -> bool {
        matches!(
            self,
            LayerKey::Cross | LayerKey::CrossWork | LayerKey::CrossCommunity | LayerKey::CrossHome
        )
    }

    /// The purpose a crosser must have for an edge of this layer to be
    /// active. `None` means any crosser qualifies.
    #[must_use]
    pub fn required_purpose(&self) -> Option<TravelPurpose> {
        match self {
            LayerKey::CrossWork => Some(TravelPurpose::Work),
            LayerKey::CrossHome => Some(TravelPurpose::Visit),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            LayerKey::Base => "base",
            LayerKey::Home => "home",
            LayerKey::School => "school",
            LayerKey::Work => "work",
            LayerKey::Community => "community",
            LayerKey::Custom(name) => name,
            LayerKey::Cross => "cross",
            LayerKey::CrossWork => "cross_work",
            LayerKey::CrossCommunity => "cross_community",
            LayerKey::CrossHome => "cross_home",
        }
    }
}

impl FromStr for LayerKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "base" => LayerKey::Base,
            "home" => LayerKey::Home,
            "school" => LayerKey::School,
            "work" => LayerKey::Work,
            "community" => LayerKey::Community,
            "cross" => LayerKey::Cross,
            "cross_work" => LayerKey::CrossWork,
            "cross_community" => LayerKey::CrossCommunity,
            "cross_home" => LayerKey::CrossHome,
            other => LayerKey::Custom(other.to_string()),
        })
    }
}

impl From<String> for LayerKey {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for LayerKey {
    fn from(value: &str) -> Self {
        LayerKey::from(value.to_string())
    }
}

impl From<LayerKey> for String {
    fn from(value: LayerKey) -> Self {
        value.as_str().to_string()
    }
}

impl Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An undirected contact between two agents.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: PersonId,
    pub target: PersonId,
    pub weight: f32,
}

/// A named edge list together with its configured weight.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactLayer {
    key: LayerKey,
    nominal_weight: f32,
    pub(crate) edges: Vec<Edge>,
}

impl ContactLayer {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if `nominal_weight` is negative or not finite.
    pub fn new(key: LayerKey, nominal_weight: f32) -> Result<Self, IxaError> {
        if !nominal_weight.is_finite() || nominal_weight < 0.0 {
            return Err(IxaError::config(format!(
                "layer {key} has invalid weight {nominal_weight}"
            )));
        }
        Ok(ContactLayer {
            key,
            nominal_weight,
            edges: Vec::new(),
        })
    }

    /// Adds an edge with an initial weight. Domestic layers start at `1.0`;
    /// cross layers start at their nominal weight.
    ///
    /// # Errors
    /// Returns `IxaError::NetworkError` for a self-loop or an invalid weight.
    pub fn add_edge(
        &mut self,
        source: PersonId,
        target: PersonId,
        weight: f32,
    ) -> Result<(), IxaError> {
        if source == target {
            return Err(IxaError::NetworkError(format!(
                "cannot make edge from {source} to itself in layer {}",
                self.key
            )));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(IxaError::NetworkError(format!(
                "invalid weight {weight} in layer {}",
                self.key
            )));
        }
        self.edges.push(Edge {
            source,
            target,
            weight,
        });
        Ok(())
    }

    #[must_use]
    pub fn key(&self) -> &LayerKey {
        &self.key
    }

    /// The per-layer transmission multiplier the host applies on top of edge
    /// weights. Active cross-layer edges carry it as their weight.
    #[must_use]
    pub fn nominal_weight(&self) -> f32 {
        self.nominal_weight
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// The set of contact layers, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Network {
    layers: IndexMap<LayerKey, ContactLayer>,
}

impl Network {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if a layer with the same key exists.
    pub fn add_layer(&mut self, layer: ContactLayer) -> Result<(), IxaError> {
        if self.layers.contains_key(layer.key()) {
            return Err(IxaError::config(format!(
                "duplicate layer key {}",
                layer.key()
            )));
        }
        self.layers.insert(layer.key().clone(), layer);
        Ok(())
    }

    #[must_use]
    pub fn get_layer(&self, key: &LayerKey) -> Option<&ContactLayer> {
        self.layers.get(key)
    }

    /// # Errors
    /// Returns `IxaError::NetworkError` if there is no such layer.
    pub(crate) fn layer_mut(&mut self, key: &LayerKey) -> Result<&mut ContactLayer, IxaError> {
        self.layers
            .get_mut(key)
            .ok_or_else(|| IxaError::NetworkError(format!("no layer named {key}")))
    }

    pub(crate) fn layers_mut(&mut self) -> impl Iterator<Item = &mut ContactLayer> {
        self.layers.values_mut()
    }

    pub fn layers(&self) -> impl Iterator<Item = &ContactLayer> {
        self.layers.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &LayerKey> {
        self.layers.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
