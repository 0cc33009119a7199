//! Contact layers and their daily edge weights.
//!
//! A [`Network`] is an ordered set of [`ContactLayer`]s keyed by
//! [`LayerKey`]. Membership of a layer only changes through the structural
//! operations here ([`ContextNetworkExt::take_edges`] and
//! [`ContextNetworkExt::restore_edges`]); edge weights are rewritten every day
//! by the functions in [`weights`].
mod layer;
pub mod weights;

use log::{debug, trace};
use serde::Serialize;

pub use layer::{ContactLayer, Edge, LayerKey, Network};

use crate::error::IxaError;
use crate::people::ContextPeopleExt;
use crate::{define_data_plugin, Context};

define_data_plugin!(NetworkPlugin, Network, Network::default());

/// Edge counts of one layer, split by the countries of the endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LayerCensus {
    pub layer: LayerKey,
    /// Edges whose endpoints share a country, per country in registry order
    pub within: Vec<(String, usize)>,
    /// Edges whose endpoints come from different countries
    pub between: usize,
    /// Edges with a non-zero weight today
    pub active: usize,
}

pub trait ContextNetworkExt {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if the key is already in use.
    fn add_layer(&mut self, layer: ContactLayer) -> Result<(), IxaError>;

    fn get_layer(&self, key: &LayerKey) -> Option<&ContactLayer>;

    /// Layer keys in the order they were added.
    fn get_layer_keys(&self) -> Vec<LayerKey>;

    /// Removes the edges at `indices` from layer `key` and returns them.
    /// Indices refer to the layer's current edge order.
    ///
    /// # Errors
    /// Returns `IxaError::NetworkError` if the layer does not exist or an
    /// index is out of range.
    fn take_edges(&mut self, key: &LayerKey, indices: &[usize]) -> Result<Vec<Edge>, IxaError>;

    /// Appends previously removed edges to layer `key`.
    ///
    /// # Errors
    /// Returns `IxaError::NetworkError` if the layer does not exist.
    fn restore_edges(&mut self, key: &LayerKey, edges: Vec<Edge>) -> Result<(), IxaError>;

    fn layer_census(&self) -> Vec<LayerCensus>;
}

impl ContextNetworkExt for Context {
    fn add_layer(&mut self, layer: ContactLayer) -> Result<(), IxaError> {
        debug!("adding layer {} with {} edges", layer.key(), layer.len());
        self.get_data_mut(NetworkPlugin).add_layer(layer)
    }

    fn get_layer(&self, key: &LayerKey) -> Option<&ContactLayer> {
        self.get_data(NetworkPlugin)?.get_layer(key)
    }

    fn get_layer_keys(&self) -> Vec<LayerKey> {
        self.get_data(NetworkPlugin)
            .map(|network| network.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn take_edges(&mut self, key: &LayerKey, indices: &[usize]) -> Result<Vec<Edge>, IxaError> {
        let layer = self.get_data_mut(NetworkPlugin).layer_mut(key)?;
        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        if let Some(&last) = indices.last() {
            if last >= layer.edges.len() {
                return Err(IxaError::NetworkError(format!(
                    "edge {last} does not exist in layer {key}"
                )));
            }
        }

        let mut removed = Vec::with_capacity(indices.len());
        let mut next = indices.iter().peekable();
        let mut kept = Vec::with_capacity(layer.edges.len() - indices.len());
        for (index, edge) in layer.edges.drain(..).enumerate() {
            if next.peek() == Some(&&index) {
                next.next();
                removed.push(edge);
            } else {
                kept.push(edge);
            }
        }
        layer.edges = kept;
        trace!("took {} edges from layer {key}", removed.len());
        Ok(removed)
    }

    fn restore_edges(&mut self, key: &LayerKey, edges: Vec<Edge>) -> Result<(), IxaError> {
        let layer = self.get_data_mut(NetworkPlugin).layer_mut(key)?;
        trace!("restoring {} edges to layer {key}", edges.len());
        layer.edges.extend(edges);
        Ok(())
    }

    fn layer_census(&self) -> Vec<LayerCensus> {
        let Some(network) = self.get_data(NetworkPlugin) else {
            return Vec::new();
        };
        let people = self.people();
        let regions = people.regions();
        network
            .layers()
            .map(|layer| {
                let mut within = vec![0; regions.len()];
                let mut between = 0;
                let mut active = 0;
                for edge in layer.edges() {
                    let source = people.country(edge.source);
                    if source == people.country(edge.target) {
                        within[source.index()] += 1;
                    } else {
                        between += 1;
                    }
                    if edge.weight > 0.0 {
                        active += 1;
                    }
                }
                LayerCensus {
                    layer: layer.key().clone(),
                    within: regions
                        .iter()
                        .map(|region| (regions.name(region).to_string(), within[region.index()]))
                        .collect(),
                    between,
                    active,
                }
            })
            .collect()
    }
}

pub(crate) fn network_mut(context: &mut Context) -> &mut Network {
    context.get_data_mut(NetworkPlugin)
}

pub(crate) fn install_network(context: &mut Context, network: Network) {
    *context.get_data_mut(NetworkPlugin) = network;
}
