//! Day-triggered edits to contact layers.
//!
//! Interventions are scoped to a region of one or more layers and are driven
//! by a single daily process in the `Normal` phase, after mobility has moved
//! people for the day. They are stepped in the order they were added:
//!
//! * [`PartialEdgeRemovalConfig`] removes a share of a layer's edges on one
//!   day and optionally puts the same edges back on a later day;
//! * [`PhaseScaledWeightingConfig`] scales domestic weights by a day-indexed
//!   schedule;
//! * [`LayerSpecificWeightCapConfig`] caps domestic weights inside a window.
//!
//! Weight interventions register a modifier with
//! [`ContextWeightsExt`](crate::network::weights::ContextWeightsExt) and only
//! toggle it here, so the mobility machine's daily resync keeps honoring them.
//! Cross-layer edges are left to the mobility machine.
//! Triggers compare against whole days; a day the host skips never fires.
//!
//! A failing step invalidates the run: the error is kept, the context is shut
//! down and [`ContextInterventionsExt::take_intervention_failure`] hands the
//! error back.
mod edge_removal;
mod phase_scaling;
mod weight_cap;

use log::{debug, error, info, trace};
use serde::{Deserialize, Serialize};

pub use edge_removal::PartialEdgeRemovalConfig;
pub use phase_scaling::PhaseScaledWeightingConfig;
pub use weight_cap::LayerSpecificWeightCapConfig;

use crate::context::ExecutionPhase;
use crate::error::IxaError;
use crate::mobility::mobility_installed;
use crate::network::weights::ContextWeightsExt;
use crate::network::{ContextNetworkExt, LayerKey};
use crate::people::{ContextPeopleExt, RegionId};
use crate::{define_data_plugin, define_rng, Context};

define_rng!(InterventionRng);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum InterventionState {
    Pending,
    /// One-shot edit done
    Applied,
    Active,
    Restored,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterventionConfig {
    PartialEdgeRemoval(PartialEdgeRemovalConfig),
    PhaseScaledWeighting(PhaseScaledWeightingConfig),
    LayerSpecificWeightCap(LayerSpecificWeightCapConfig),
}

impl InterventionConfig {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), IxaError> {
        match self {
            InterventionConfig::PartialEdgeRemoval(config) => config.validate(),
            InterventionConfig::PhaseScaledWeighting(config) => config.validate(),
            InterventionConfig::LayerSpecificWeightCap(config) => config.validate(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct InterventionId(usize);

/// What a step did to the network.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct StepOutcome {
    pub(crate) weights_changed: bool,
    pub(crate) edges_changed: bool,
}

impl StepOutcome {
    fn merge(self, other: StepOutcome) -> StepOutcome {
        StepOutcome {
            weights_changed: self.weights_changed || other.weights_changed,
            edges_changed: self.edges_changed || other.edges_changed,
        }
    }
}

pub(crate) trait Intervention {
    fn describe(&self) -> String;

    fn state(&self) -> InterventionState;

    fn step(&mut self, context: &mut Context, day: u32) -> Result<StepOutcome, IxaError>;
}

#[derive(Default)]
struct InterventionData {
    interventions: Vec<Box<dyn Intervention>>,
    process_installed: bool,
    failure: Option<IxaError>,
}

define_data_plugin!(InterventionPlugin, InterventionData, InterventionData::default());

pub(crate) fn resolve_region(context: &Context, name: &str) -> Result<RegionId, IxaError> {
    context
        .get_regions()
        .id_of(name)
        .ok_or_else(|| IxaError::config(format!("unknown region {name}")))
}

pub(crate) fn require_layer(context: &Context, key: &LayerKey) -> Result<(), IxaError> {
    if context.get_layer(key).is_none() {
        return Err(IxaError::NetworkError(format!("layer {key} does not exist")));
    }
    Ok(())
}

/// Weight interventions only act on region-internal layers.
pub(crate) fn require_domestic_layer(context: &Context, key: &LayerKey) -> Result<(), IxaError> {
    if key.is_cross() {
        return Err(IxaError::config(format!(
            "weight interventions cannot target cross layer {key}"
        )));
    }
    require_layer(context, key)
}

pub trait ContextInterventionsExt {
    /// Validates `config` against the installed population and network and
    /// schedules it. The first call registers the daily intervention process.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` for invalid parameters or an
    /// unknown region, and `IxaError::NetworkError` if a named layer does not
    /// exist.
    fn add_intervention(&mut self, config: InterventionConfig) -> Result<InterventionId, IxaError>;

    fn get_intervention_state(&self, id: InterventionId) -> Option<InterventionState>;

    /// A description and the current state of every intervention, in the
    /// order they were added.
    fn get_intervention_states(&self) -> Vec<(String, InterventionState)>;

    /// The error that stopped the run, if an intervention failed.
    fn take_intervention_failure(&mut self) -> Option<IxaError>;
}

impl ContextInterventionsExt for Context {
    fn add_intervention(&mut self, config: InterventionConfig) -> Result<InterventionId, IxaError> {
        config.validate()?;
        let intervention: Box<dyn Intervention> = match config {
            InterventionConfig::PartialEdgeRemoval(config) => {
                Box::new(edge_removal::PartialEdgeRemoval::new(self, config)?)
            }
            InterventionConfig::PhaseScaledWeighting(config) => {
                Box::new(phase_scaling::PhaseScaledWeighting::new(self, config)?)
            }
            InterventionConfig::LayerSpecificWeightCap(config) => {
                Box::new(weight_cap::LayerSpecificWeightCap::new(self, config)?)
            }
        };
        info!("adding intervention {}", intervention.describe());

        let data = self.get_data_mut(InterventionPlugin);
        data.interventions.push(intervention);
        let id = InterventionId(data.interventions.len() - 1);
        if !data.process_installed {
            data.process_installed = true;
            self.add_daily_process(intervention_step, ExecutionPhase::Normal);
        }
        Ok(id)
    }

    fn get_intervention_state(&self, id: InterventionId) -> Option<InterventionState> {
        self.get_data(InterventionPlugin)?
            .interventions
            .get(id.0)
            .map(|intervention| intervention.state())
    }

    fn get_intervention_states(&self) -> Vec<(String, InterventionState)> {
        self.get_data(InterventionPlugin)
            .map(|data| {
                data.interventions
                    .iter()
                    .map(|intervention| (intervention.describe(), intervention.state()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn take_intervention_failure(&mut self) -> Option<IxaError> {
        self.get_data_mut(InterventionPlugin).failure.take()
    }
}

fn intervention_step(context: &mut Context) {
    let Some(day) = context.get_current_day() else {
        trace!("interventions skipped at t={}", context.get_current_time());
        return;
    };

    let mut interventions = std::mem::take(&mut context.get_data_mut(InterventionPlugin).interventions);
    let mut outcome = StepOutcome::default();
    let mut failure = None;
    for intervention in &mut interventions {
        match intervention.step(context, day) {
            Ok(step) => outcome = outcome.merge(step),
            Err(e) => {
                error!("day {day}: {} failed: {e}", intervention.describe());
                failure = Some(e);
                break;
            }
        }
    }
    let data = context.get_data_mut(InterventionPlugin);
    data.interventions = interventions;
    if let Some(e) = failure {
        data.failure = Some(e);
        context.shutdown();
        return;
    }

    if outcome.weights_changed || outcome.edges_changed {
        debug!("day {day}: interventions changed the network, resyncing weights");
        context.resync_domestic_weights();
        // Restored cross edges carry the weight they had when removed.
        if outcome.edges_changed && mobility_installed(context) {
            context.activate_cross_layers();
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::mobility::{ContextMobilityExt, MobilityConfig};
    use crate::network::weights::RegionKey;
    use crate::network::{install_network, ContactLayer, Network};
    use crate::people::{install_people, PeopleData, PersonId, RegionRegistry, Sex};
    use crate::random::ContextRandomExt;

    // People 0..4 come from A, 4..8 from B. 0 and 4 are crossers with one
    // cross edge each into the other region.
    fn setup() -> Context {
        let mut regions = RegionRegistry::new();
        let a = regions.register("A");
        let b = regions.register("B");
        let mut people = PeopleData::new(regions);
        for i in 0..8 {
            people.add_person(35, Sex::Female, if i < 4 { a } else { b });
        }
        people.mark_crosser(PersonId(0), None);
        people.mark_crosser(PersonId(4), None);
        let mut context = Context::new();
        context.init_random(17);
        install_people(&mut context, people);

        let mut work = ContactLayer::new(LayerKey::Work, 1.0).unwrap();
        work.add_edge(PersonId(0), PersonId(1), 1.0).unwrap();
        work.add_edge(PersonId(2), PersonId(3), 1.0).unwrap();
        work.add_edge(PersonId(5), PersonId(6), 1.0).unwrap();
        context.add_layer(work).unwrap();
        let mut cross = ContactLayer::new(LayerKey::Cross, 0.6).unwrap();
        cross.add_edge(PersonId(0), PersonId(5), 0.6).unwrap();
        cross.add_edge(PersonId(4), PersonId(1), 0.6).unwrap();
        context.add_layer(cross).unwrap();
        context
    }

    fn weights(context: &Context, key: &LayerKey) -> Vec<f32> {
        context
            .get_layer(key)
            .unwrap()
            .edges()
            .iter()
            .map(|edge| edge.weight)
            .collect()
    }

    fn close_work_in_a(start_day: u32) -> InterventionConfig {
        InterventionConfig::PartialEdgeRemoval(PartialEdgeRemovalConfig {
            layer: LayerKey::Work,
            region: "A".to_string(),
            fraction: 0.0,
            start_day,
            end_day: None,
            seed: None,
            region_key: RegionKey::Country,
        })
    }

    #[test]
    fn static_cross_layer_survives_edge_removal() {
        let mut context = setup();
        context.add_intervention(close_work_in_a(1)).unwrap();

        context.execute_days(2);
        assert_eq!(weights(&context, &LayerKey::Work), vec![1.0]);
        assert_eq!(weights(&context, &LayerKey::Cross), vec![0.6, 0.6]);
    }

    #[test]
    fn weight_modifiers_hold_across_mobility_days() {
        let mut context = setup();
        context
            .install_mobility(MobilityConfig {
                travel_fraction: 1.0,
                duration_min: 2,
                duration_max: 2,
                end_day_outbound: Some(1),
                ..MobilityConfig::default()
            })
            .unwrap();
        context
            .add_intervention(InterventionConfig::LayerSpecificWeightCap(
                LayerSpecificWeightCapConfig {
                    layers: vec![LayerKey::Work],
                    region: "A".to_string(),
                    value: 0.3,
                    start_day: 0,
                    end_day: None,
                    region_key: RegionKey::Country,
                },
            ))
            .unwrap();
        context
            .add_intervention(InterventionConfig::PhaseScaledWeighting(
                PhaseScaledWeightingConfig {
                    layer: LayerKey::Work,
                    region: "B".to_string(),
                    schedule: vec![(0, 0.5)],
                    region_key: RegionKey::Country,
                },
            ))
            .unwrap();

        // Day 0: both crossers leave, so person 0's work edge is off while
        // the rest of the layer carries the modifiers.
        context.execute_days(1);
        assert_eq!(weights(&context, &LayerKey::Work), vec![0.0, 0.3, 0.5]);
        assert_eq!(weights(&context, &LayerKey::Cross), vec![0.6, 0.6]);

        // Day 1: the modifiers do not change but the morning resync keeps them.
        context.execute_days(1);
        assert_eq!(weights(&context, &LayerKey::Work), vec![0.0, 0.3, 0.5]);

        // Day 2: the crossers are back.
        context.execute_days(1);
        assert_eq!(weights(&context, &LayerKey::Work), vec![0.3, 0.3, 0.5]);
        assert_eq!(weights(&context, &LayerKey::Cross), vec![0.0, 0.0]);
        assert_eq!(context.get_travel_summary().returns, 2);
    }

    #[test]
    fn failing_step_stops_the_run() {
        let mut context = setup();
        context.add_intervention(close_work_in_a(1)).unwrap();
        install_network(&mut context, Network::default());

        context.execute_days(5);
        assert_eq!(context.get_current_time(), 1.0);
        assert!(matches!(
            context.take_intervention_failure(),
            Some(IxaError::NetworkError(_))
        ));
        assert!(context.take_intervention_failure().is_none());
    }
}
