use log::info;
use serde::Deserialize;

use crate::error::IxaError;
use crate::interventions::{
    require_domestic_layer, resolve_region, Intervention, InterventionState, StepOutcome,
};
use crate::network::weights::{ContextWeightsExt, ModifierId, RegionKey, WeightOp};
use crate::network::LayerKey;
use crate::Context;

fn default_layer() -> LayerKey {
    LayerKey::Base
}

/// Scales domestic weights of `layer` in `region` by the latest schedule
/// entry whose day has been reached.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PhaseScaledWeightingConfig {
    #[serde(default = "default_layer")]
    pub layer: LayerKey,
    pub region: String,
    /// `(day, scale)` pairs
    pub schedule: Vec<(u32, f32)>,
    #[serde(default)]
    pub region_key: RegionKey,
}

impl PhaseScaledWeightingConfig {
    pub(crate) fn validate(&self) -> Result<(), IxaError> {
        if self.schedule.is_empty() {
            return Err(IxaError::config(format!(
                "phase scaling on {}: empty schedule",
                self.layer
            )));
        }
        for &(day, scale) in &self.schedule {
            if !scale.is_finite() || scale < 0.0 {
                return Err(IxaError::config(format!(
                    "phase scaling on {}: invalid scale {scale} on day {day}",
                    self.layer
                )));
            }
        }
        Ok(())
    }

    /// The scale in force on `day`, if any entry has started.
    #[must_use]
    pub fn scale_on(&self, day: u32) -> Option<f32> {
        // Stable, so the later of two entries for the same day wins.
        let mut schedule = self.schedule.clone();
        schedule.sort_by_key(|&(start, _)| start);
        schedule
            .iter()
            .rev()
            .find(|&&(start, _)| start <= day)
            .map(|&(_, scale)| scale)
    }
}

pub(crate) struct PhaseScaledWeighting {
    config: PhaseScaledWeightingConfig,
    modifier: ModifierId,
    state: InterventionState,
}

impl PhaseScaledWeighting {
    pub(crate) fn new(context: &mut Context, config: PhaseScaledWeightingConfig) -> Result<Self, IxaError> {
        require_domestic_layer(context, &config.layer)?;
        let region = resolve_region(context, &config.region)?;
        let modifier = context.add_weight_modifier(vec![config.layer.clone()], region, config.region_key);
        Ok(PhaseScaledWeighting {
            config,
            modifier,
            state: InterventionState::Pending,
        })
    }
}

impl Intervention for PhaseScaledWeighting {
    fn describe(&self) -> String {
        format!("phase scaling ({} in {})", self.config.layer, self.config.region)
    }

    fn state(&self) -> InterventionState {
        self.state
    }

    fn step(&mut self, context: &mut Context, day: u32) -> Result<StepOutcome, IxaError> {
        let scale = self.config.scale_on(day);
        if scale.is_some() {
            self.state = InterventionState::Active;
        }
        let changed = context.set_weight_modifier(self.modifier, scale.map(WeightOp::Scale));
        if changed {
            info!("{}: scale {} from day {day}", self.describe(), scale.unwrap_or(1.0));
        }
        Ok(StepOutcome {
            weights_changed: changed,
            ..StepOutcome::default()
        })
    }
}
