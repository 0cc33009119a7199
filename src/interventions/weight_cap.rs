use log::info;
use serde::Deserialize;

use crate::error::IxaError;
use crate::interventions::{
    require_domestic_layer, resolve_region, Intervention, InterventionState, StepOutcome,
};
use crate::network::weights::{ContextWeightsExt, ModifierId, RegionKey, WeightOp};
use crate::network::LayerKey;
use crate::Context;

/// Sets domestic weights of `layers` in `region` to `value` from
/// `start_day` through `end_day` inclusive. Modifiers registered later still
/// apply on top.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LayerSpecificWeightCapConfig {
    pub layers: Vec<LayerKey>,
    pub region: String,
    pub value: f32,
    pub start_day: u32,
    #[serde(default)]
    pub end_day: Option<u32>,
    #[serde(default)]
    pub region_key: RegionKey,
}

impl LayerSpecificWeightCapConfig {
    pub(crate) fn validate(&self) -> Result<(), IxaError> {
        if self.layers.is_empty() {
            return Err(IxaError::config("weight cap names no layers"));
        }
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(IxaError::config(format!("invalid weight cap {}", self.value)));
        }
        if self.end_day.is_some_and(|end_day| end_day < self.start_day) {
            return Err(IxaError::config(format!(
                "weight cap ends before it starts on day {}",
                self.start_day
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn in_window(&self, day: u32) -> bool {
        day >= self.start_day && self.end_day.is_none_or(|end_day| day <= end_day)
    }
}

pub(crate) struct LayerSpecificWeightCap {
    config: LayerSpecificWeightCapConfig,
    modifier: ModifierId,
    state: InterventionState,
}

impl LayerSpecificWeightCap {
    pub(crate) fn new(context: &mut Context, config: LayerSpecificWeightCapConfig) -> Result<Self, IxaError> {
        for layer in &config.layers {
            require_domestic_layer(context, layer)?;
        }
        let region = resolve_region(context, &config.region)?;
        let modifier = context.add_weight_modifier(config.layers.clone(), region, config.region_key);
        Ok(LayerSpecificWeightCap {
            config,
            modifier,
            state: InterventionState::Pending,
        })
    }
}

impl Intervention for LayerSpecificWeightCap {
    fn describe(&self) -> String {
        let layers: Vec<&str> = self.config.layers.iter().map(LayerKey::as_str).collect();
        format!(
            "weight cap {} ({} in {})",
            self.config.value,
            layers.join(","),
            self.config.region
        )
    }

    fn state(&self) -> InterventionState {
        self.state
    }

    fn step(&mut self, context: &mut Context, day: u32) -> Result<StepOutcome, IxaError> {
        let active = self.config.in_window(day);
        let op = active.then_some(WeightOp::Set(self.config.value));
        let changed = context.set_weight_modifier(self.modifier, op);
        if changed {
            self.state = if active {
                InterventionState::Active
            } else {
                InterventionState::Restored
            };
            info!("{}: {:?} on day {day}", self.describe(), self.state);
        }
        Ok(StepOutcome {
            weights_changed: changed,
            ..StepOutcome::default()
        })
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::interventions::{ContextInterventionsExt, InterventionConfig};
    use crate::network::{ContactLayer, ContextNetworkExt};
    use crate::people::{install_people, PeopleData, PersonId, RegionRegistry, Sex};

    fn setup() -> Context {
        let mut regions = RegionRegistry::new();
        let a = regions.register("A");
        let b = regions.register("B");
        let mut people = PeopleData::new(regions);
        for i in 0..4 {
            people.add_person(50, Sex::Male, if i < 2 { a } else { b });
        }
        let mut context = Context::new();
        install_people(&mut context, people);
        for key in [LayerKey::Work, LayerKey::School] {
            let mut layer = ContactLayer::new(key, 1.0).unwrap();
            layer.add_edge(PersonId(0), PersonId(1), 1.0).unwrap();
            layer.add_edge(PersonId(2), PersonId(3), 1.0).unwrap();
            context.add_layer(layer).unwrap();
        }
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

    fn cap(start_day: u32, end_day: Option<u32>) -> LayerSpecificWeightCapConfig {
        LayerSpecificWeightCapConfig {
            layers: vec![LayerKey::Work],
            region: "A".to_string(),
            value: 0.3,
            start_day,
            end_day,
            region_key: RegionKey::Country,
        }
    }

    #[test]
    fn window_is_inclusive() {
        let config = cap(2, Some(4));
        let days: Vec<u32> = (0..7).filter(|&day| config.in_window(day)).collect();
        assert_eq!(days, vec![2, 3, 4]);
        assert!(cap(2, None).in_window(1000));
    }

    #[test]
    fn caps_only_named_layers_in_region_inside_window() {
        let mut context = setup();
        let id = context
            .add_intervention(InterventionConfig::LayerSpecificWeightCap(cap(1, Some(2))))
            .unwrap();

        context.execute_days(1);
        assert_eq!(weights(&context, &LayerKey::Work), vec![1.0, 1.0]);

        context.execute_days(2);
        assert_eq!(weights(&context, &LayerKey::Work), vec![0.3, 1.0]);
        assert_eq!(weights(&context, &LayerKey::School), vec![1.0, 1.0]);
        assert_eq!(context.get_intervention_state(id), Some(InterventionState::Active));

        context.execute_days(1);
        assert_eq!(weights(&context, &LayerKey::Work), vec![1.0, 1.0]);
        assert_eq!(context.get_intervention_state(id), Some(InterventionState::Restored));
    }

    #[test]
    fn cap_and_scale_compose_in_order() {
        let mut context = setup();
        context
            .add_intervention(InterventionConfig::LayerSpecificWeightCap(cap(0, None)))
            .unwrap();
        context
            .add_intervention(InterventionConfig::PhaseScaledWeighting(
                crate::interventions::PhaseScaledWeightingConfig {
                    layer: LayerKey::Work,
                    region: "A".to_string(),
                    schedule: vec![(0, 0.5)],
                    region_key: RegionKey::Country,
                },
            ))
            .unwrap();
        context.execute_days(1);
        // 0.3 * 0.5
        assert_relative_eq!(weights(&context, &LayerKey::Work)[0], 0.15);
    }

    #[test]
    fn cap_sets_the_value_even_above_one() {
        let mut context = setup();
        context
            .add_intervention(InterventionConfig::LayerSpecificWeightCap(
                LayerSpecificWeightCapConfig {
                    value: 1.5,
                    ..cap(0, None)
                },
            ))
            .unwrap();
        context.execute_days(1);
        assert_eq!(weights(&context, &LayerKey::Work), vec![1.5, 1.0]);
    }

    #[test]
    fn invalid_caps_are_rejected() {
        assert!(cap(3, Some(2)).validate().is_err());
        let negative = LayerSpecificWeightCapConfig {
            value: -0.1,
            ..cap(0, None)
        };
        assert!(negative.validate().is_err());
        let mut context = setup();
        let missing = LayerSpecificWeightCapConfig {
            layers: vec![LayerKey::Community],
            ..cap(0, None)
        };
        assert!(matches!(
            context.add_intervention(InterventionConfig::LayerSpecificWeightCap(missing)),
            Err(IxaError::NetworkError(_))
        ));
    }
}
