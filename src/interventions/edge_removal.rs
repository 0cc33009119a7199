use log::{info, warn};
use serde::Deserialize;

use crate::error::IxaError;
use crate::interventions::{
    require_layer, resolve_region, Intervention, InterventionRng, InterventionState, StepOutcome,
};
use crate::network::weights::RegionKey;
use crate::network::{ContextNetworkExt, Edge, LayerKey};
use crate::people::{ContextPeopleExt, RegionId};
use crate::rand::rngs::SmallRng;
use crate::rand::SeedableRng;
use crate::random::{sample_multiple_from_known_length, ContextRandomExt};
use crate::Context;

/// Removes edges of `layer` touching `region` on `start_day`, keeping a
/// `fraction` of them. `fraction = 0` closes the layer in the region.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PartialEdgeRemovalConfig {
    pub layer: LayerKey,
    pub region: String,
    pub fraction: f64,
    pub start_day: u32,
    /// The removed edges come back on this day.
    #[serde(default)]
    pub end_day: Option<u32>,
    /// Draws the removed edges from a dedicated stream instead of the
    /// context's base seed.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub region_key: RegionKey,
}

impl PartialEdgeRemovalConfig {
    pub(crate) fn validate(&self) -> Result<(), IxaError> {
        if !(0.0..=1.0).contains(&self.fraction) {
            return Err(IxaError::config(format!(
                "edge removal on {}: fraction must be in [0, 1], got {}",
                self.layer, self.fraction
            )));
        }
        if let Some(end_day) = self.end_day {
            if end_day <= self.start_day {
                return Err(IxaError::config(format!(
                    "edge removal on {}: end_day {end_day} is not after start_day {}",
                    self.layer, self.start_day
                )));
            }
        }
        Ok(())
    }
}

pub(crate) struct PartialEdgeRemoval {
    config: PartialEdgeRemovalConfig,
    region: RegionId,
    state: InterventionState,
    removed: Vec<Edge>,
}

impl PartialEdgeRemoval {
    pub(crate) fn new(context: &Context, config: PartialEdgeRemovalConfig) -> Result<Self, IxaError> {
        require_layer(context, &config.layer)?;
        let region = resolve_region(context, &config.region)?;
        Ok(PartialEdgeRemoval {
            config,
            region,
            state: InterventionState::Pending,
            removed: Vec::new(),
        })
    }

    fn remove(&mut self, context: &mut Context) -> Result<(), IxaError> {
        let key = &self.config.layer;
        let layer = context
            .get_layer(key)
            .ok_or_else(|| IxaError::NetworkError(format!("layer {key} does not exist")))?;
        let people = context.people();
        let touching: Vec<usize> = layer
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, edge)| self.config.region_key.edge_in_region(people, edge, self.region))
            .map(|(index, _)| index)
            .collect();
        if touching.is_empty() {
            warn!("edge removal on {key}: no edges touch region {}", self.config.region);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let count = (touching.len() as f64 * (1.0 - self.config.fraction)).floor() as usize;
        let chosen = match self.config.seed {
            Some(seed) => {
                let mut rng = SmallRng::seed_from_u64(seed);
                sample_multiple_from_known_length(&mut rng, touching, count)
            }
            None => context.sample(InterventionRng, |rng| {
                sample_multiple_from_known_length(rng, touching, count)
            }),
        };
        self.removed = context.take_edges(key, &chosen)?;
        info!(
            "edge removal on {key}: removed {} edges in region {}",
            self.removed.len(),
            self.config.region
        );
        Ok(())
    }
}

impl Intervention for PartialEdgeRemoval {
    fn describe(&self) -> String {
        format!(
            "partial edge removal ({} in {}, keep {})",
            self.config.layer, self.config.region, self.config.fraction
        )
    }

    fn state(&self) -> InterventionState {
        self.state
    }

    fn step(&mut self, context: &mut Context, day: u32) -> Result<StepOutcome, IxaError> {
        match self.state {
            InterventionState::Pending if day == self.config.start_day => {
                // The edit counts as done even if it fails so it is not retried.
                self.state = if self.config.end_day.is_some() {
                    InterventionState::Active
                } else {
                    InterventionState::Applied
                };
                self.remove(context)?;
                Ok(StepOutcome {
                    edges_changed: true,
                    ..StepOutcome::default()
                })
            }
            InterventionState::Active if Some(day) == self.config.end_day => {
                self.state = InterventionState::Restored;
                let edges = std::mem::take(&mut self.removed);
                info!(
                    "edge removal on {}: restoring {} edges",
                    self.config.layer,
                    edges.len()
                );
                context.restore_edges(&self.config.layer, edges)?;
                Ok(StepOutcome {
                    edges_changed: true,
                    ..StepOutcome::default()
                })
            }
            _ => Ok(StepOutcome::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interventions::{ContextInterventionsExt, InterventionConfig};
    use crate::network::ContactLayer;
    use crate::people::{install_people, PeopleData, PersonId, RegionRegistry, Sex};
    use crate::HashSet;

    // A: people 0..10 in a path, B: people 10..20 in a path.
    fn setup() -> Context {
        let mut regions = RegionRegistry::new();
        let a = regions.register("A");
        let b = regions.register("B");
        let mut people = PeopleData::new(regions);
        for i in 0..20 {
            people.add_person(30, Sex::Male, if i < 10 { a } else { b });
        }
        let mut context = Context::new();
        context.init_random(3);
        install_people(&mut context, people);
        let mut base = ContactLayer::new(LayerKey::Base, 1.0).unwrap();
        for i in (0..9).chain(10..19) {
            base.add_edge(PersonId(i), PersonId(i + 1), 1.0).unwrap();
        }
        context.add_layer(base).unwrap();
        context
    }

    fn removal(fraction: f64, end_day: Option<u32>) -> PartialEdgeRemovalConfig {
        PartialEdgeRemovalConfig {
            layer: LayerKey::Base,
            region: "A".to_string(),
            fraction,
            start_day: 2,
            end_day,
            seed: None,
            region_key: RegionKey::Country,
        }
    }

    fn edges_in_a(context: &Context) -> usize {
        context
            .get_layer(&LayerKey::Base)
            .unwrap()
            .edges()
            .iter()
            .filter(|edge| edge.source.index() < 10)
            .count()
    }

    #[test]
    fn closure_removes_every_edge_on_start_day() {
        let mut context = setup();
        let id = context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(removal(0.0, None)))
            .unwrap();
        context.execute_days(2);
        assert_eq!(edges_in_a(&context), 9);
        assert_eq!(context.get_intervention_state(id), Some(InterventionState::Pending));

        context.execute_days(1);
        assert_eq!(edges_in_a(&context), 0);
        assert_eq!(context.get_layer(&LayerKey::Base).unwrap().len(), 9);
        assert_eq!(context.get_intervention_state(id), Some(InterventionState::Applied));
    }

    #[test]
    fn fraction_one_is_a_no_op() {
        let mut context = setup();
        context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(removal(1.0, None)))
            .unwrap();
        context.execute_days(5);
        assert_eq!(context.get_layer(&LayerKey::Base).unwrap().len(), 18);
    }

    #[test]
    fn removed_edges_come_back() {
        let mut context = setup();
        let before: HashSet<(PersonId, PersonId)> = context
            .get_layer(&LayerKey::Base)
            .unwrap()
            .edges()
            .iter()
            .map(|edge| (edge.source, edge.target))
            .collect();
        let id = context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(removal(0.5, Some(4))))
            .unwrap();

        context.execute_days(3);
        // floor(9 * 0.5) = 4 removed
        assert_eq!(edges_in_a(&context), 5);
        assert_eq!(context.get_intervention_state(id), Some(InterventionState::Active));

        context.execute_days(2);
        let after: HashSet<(PersonId, PersonId)> = context
            .get_layer(&LayerKey::Base)
            .unwrap()
            .edges()
            .iter()
            .map(|edge| (edge.source, edge.target))
            .collect();
        assert_eq!(before, after);
        assert_eq!(context.get_intervention_state(id), Some(InterventionState::Restored));
    }

    #[test]
    fn seeded_removal_is_reproducible() {
        let run = || {
            let mut context = setup();
            let config = PartialEdgeRemovalConfig {
                seed: Some(11),
                ..removal(0.5, None)
            };
            context
                .add_intervention(InterventionConfig::PartialEdgeRemoval(config))
                .unwrap();
            context.execute_days(3);
            context.get_layer(&LayerKey::Base).unwrap().edges().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn bad_configs_are_rejected() {
        let mut context = setup();
        let error = context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(removal(1.5, None)))
            .unwrap_err();
        assert!(matches!(error, IxaError::ConfigurationError(_)));

        let error = context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(removal(0.5, Some(2))))
            .unwrap_err();
        assert!(matches!(error, IxaError::ConfigurationError(_)));

        let unknown_region = PartialEdgeRemovalConfig {
            region: "Q".to_string(),
            ..removal(0.5, None)
        };
        let error = context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(unknown_region))
            .unwrap_err();
        assert!(matches!(error, IxaError::ConfigurationError(_)));

        let missing_layer = PartialEdgeRemovalConfig {
            layer: LayerKey::School,
            ..removal(0.5, None)
        };
        let error = context
            .add_intervention(InterventionConfig::PartialEdgeRemoval(missing_layer))
            .unwrap_err();
        assert!(matches!(error, IxaError::NetworkError(_)));
    }
}
