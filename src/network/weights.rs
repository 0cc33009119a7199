//! Daily edge weights.
//!
//! The weight of a region-internal edge is a pure function of today's state:
//! zero if either endpoint is away from its country, otherwise the active
//! [`WeightOp`]s whose scope covers the edge, folded over `1.0` in the order
//! they were registered. Mobility and the weight interventions both go
//! through [`ContextWeightsExt::resync_domestic_weights`], so a resync can run
//! any number of times a day and always lands on the same weights.
//!
//! Cross-layer edges are switched on and off by
//! [`ContextWeightsExt::activate_cross_layers`] based on where their crosser
//! endpoint is and why it travels.
use log::trace;
use serde::{Deserialize, Serialize};

use crate::network::{network_mut, Edge, LayerKey, Network};
use crate::people::{ContextPeopleExt, PeopleData, PersonId, RegionId};
use crate::{define_data_plugin, Context};

/// How an active modifier changes a domestic weight.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WeightOp {
    Scale(f32),
    /// Replaces the weight outright
    Set(f32),
}

impl WeightOp {
    #[must_use]
    pub fn apply(self, weight: f32) -> f32 {
        match self {
            WeightOp::Scale(scale) => weight * scale,
            WeightOp::Set(value) => value,
        }
    }
}

/// Which attribute decides whether an edge belongs to a region: an edge is in
/// scope when either endpoint's position (or country) is the region.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKey {
    #[default]
    Position,
    Country,
}

impl RegionKey {
    #[must_use]
    pub fn region_of(self, people: &PeopleData, person: PersonId) -> RegionId {
        match self {
            RegionKey::Position => people.position(person),
            RegionKey::Country => people.country(person),
        }
    }

    #[must_use]
    pub fn edge_in_region(self, people: &PeopleData, edge: &Edge, region: RegionId) -> bool {
        self.region_of(people, edge.source) == region || self.region_of(people, edge.target) == region
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModifierId(usize);

#[derive(Clone, Debug)]
struct WeightModifier {
    layers: Vec<LayerKey>,
    region: RegionId,
    region_key: RegionKey,
    op: Option<WeightOp>,
}

impl WeightModifier {
    fn applies_to(&self, people: &PeopleData, layer: &LayerKey, edge: &Edge) -> bool {
        self.layers.contains(layer) && self.region_key.edge_in_region(people, edge, self.region)
    }
}

define_data_plugin!(WeightModifierPlugin, Vec<WeightModifier>, Vec::new());

const NO_MODIFIERS: &[WeightModifier] = &[];

fn domestic_weight(
    people: &PeopleData,
    modifiers: &[WeightModifier],
    layer: &LayerKey,
    edge: &Edge,
) -> f32 {
    if people.is_away(edge.source) || people.is_away(edge.target) {
        return 0.0;
    }
    modifiers
        .iter()
        .filter(|modifier| modifier.applies_to(people, layer, edge))
        .filter_map(|modifier| modifier.op)
        .fold(1.0, |weight, op| op.apply(weight))
}

fn cross_weight(people: &PeopleData, layer: &LayerKey, nominal: f32, edge: &Edge) -> f32 {
    let crosser = if people.is_crosser(edge.source) {
        edge.source
    } else if people.is_crosser(edge.target) {
        edge.target
    } else {
        return 0.0;
    };
    let purpose_matches = layer
        .required_purpose()
        .is_none_or(|required| people.purpose(crosser) == Some(required));
    if people.is_away(crosser) && purpose_matches {
        nominal
    } else {
        0.0
    }
}

pub trait ContextWeightsExt {
    /// Registers a modifier over `layers` in `region`. It starts inactive.
    fn add_weight_modifier(
        &mut self,
        layers: Vec<LayerKey>,
        region: RegionId,
        region_key: RegionKey,
    ) -> ModifierId;

    /// Activates (`Some`) or deactivates (`None`) a modifier. Returns true if
    /// that changed anything.
    fn set_weight_modifier(&mut self, id: ModifierId, op: Option<WeightOp>) -> bool;

    /// The weight `edge` of region-internal layer `layer` should carry today.
    fn domestic_weight(&self, layer: &LayerKey, edge: &Edge) -> f32;

    /// Recomputes every region-internal edge weight from current state.
    fn resync_domestic_weights(&mut self);

    /// Sets every cross-layer edge to its nominal weight if its crosser is
    /// away for a matching purpose, else to zero.
    fn activate_cross_layers(&mut self);
}

impl ContextWeightsExt for Context {
    fn add_weight_modifier(
        &mut self,
        layers: Vec<LayerKey>,
        region: RegionId,
        region_key: RegionKey,
    ) -> ModifierId {
        let modifiers = self.get_data_mut(WeightModifierPlugin);
        modifiers.push(WeightModifier {
            layers,
            region,
            region_key,
            op: None,
        });
        ModifierId(modifiers.len() - 1)
    }

    fn set_weight_modifier(&mut self, id: ModifierId, op: Option<WeightOp>) -> bool {
        let modifier = &mut self.get_data_mut(WeightModifierPlugin)[id.0];
        if modifier.op == op {
            return false;
        }
        trace!("weight modifier {} -> {op:?}", id.0);
        modifier.op = op;
        true
    }

    fn domestic_weight(&self, layer: &LayerKey, edge: &Edge) -> f32 {
        let modifiers = self
            .get_data(WeightModifierPlugin)
            .map_or(NO_MODIFIERS, Vec::as_slice);
        domestic_weight(self.people(), modifiers, layer, edge)
    }

    fn resync_domestic_weights(&mut self) {
        let mut network = std::mem::take(network_mut(self));
        let people = self.people();
        let modifiers = self
            .get_data(WeightModifierPlugin)
            .map_or(NO_MODIFIERS, Vec::as_slice);
        for layer in network.layers_mut() {
            let key = layer.key().clone();
            if key.is_cross() {
                continue;
            }
            for edge in &mut layer.edges {
                edge.weight = domestic_weight(people, modifiers, &key, edge);
            }
        }
        restore(self, network);
    }

    fn activate_cross_layers(&mut self) {
        let mut network = std::mem::take(network_mut(self));
        let people = self.people();
        for layer in network.layers_mut() {
            let key = layer.key().clone();
            if !key.is_cross() {
                continue;
            }
            let nominal = layer.nominal_weight();
            for edge in &mut layer.edges {
                edge.weight = cross_weight(people, &key, nominal, edge);
            }
        }
        restore(self, network);
    }
}

fn restore(context: &mut Context, network: Network) {
    *network_mut(context) = network;
}
