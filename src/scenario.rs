//! Wiring a whole scenario from one set of parameters.
//!
//! [`Parameters`] is a global property, so a scenario can be loaded from the
//! runner's `--config` file:
//!
//! ```json
//! {
//!   "ixa_crossborder.Parameters": {
//!     "population": { "size": 1000, "seed": 1, "regions": { "A": 2, "B": 1 },
//!                     "layers": [{ "name": "base", "kind": "scale_free", "connectivity": 3 }] },
//!     "cross_layer": { "traveler_fraction": 0.03, "edges_per_traveler": 2, "seed": 5 },
//!     "mobility": { "travel_fraction": 0.1 },
//!     "interventions": [],
//!     "n_days": 10
//!   }
//! }
//! ```
use log::info;
use serde::{Deserialize, Serialize};

use crate::cross_layer::{synthesize_cross_layers, CrossLayerConfig, CrossLayerSummary};
use crate::define_global_property;
use crate::error::IxaError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::interventions::{ContextInterventionsExt, InterventionConfig, InterventionState};
use crate::mobility::{ContextMobilityExt, MobilityConfig, TravelSummary};
use crate::network::{ContextNetworkExt, LayerCensus};
use crate::population::{build_population, ContextPopulationExt, PopulationConfig};
use crate::Context;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScenarioParameters {
    pub population: PopulationConfig,
    #[serde(default)]
    pub cross_layer: Option<CrossLayerConfig>,
    #[serde(default)]
    pub mobility: Option<MobilityConfig>,
    #[serde(default)]
    pub interventions: Vec<InterventionConfig>,
    pub n_days: u32,
    /// The number of agents the host engine was set up for, if it cares.
    #[serde(default)]
    pub host_population_size: Option<usize>,
}

fn validate_parameters(parameters: &ScenarioParameters) -> Result<(), IxaError> {
    parameters.population.validate()?;
    if let Some(cross_layer) = &parameters.cross_layer {
        cross_layer.validate()?;
    }
    if let Some(mobility) = &parameters.mobility {
        mobility.validate()?;
    }
    for intervention in &parameters.interventions {
        intervention.validate()?;
    }
    Ok(())
}

define_global_property!(Parameters, ScenarioParameters, validate_parameters);

/// Everything worth reporting after a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub day: f64,
    pub cross_layers: Option<CrossLayerSummary>,
    pub travel: TravelSummary,
    pub interventions: Vec<(String, InterventionState)>,
    pub census: Vec<LayerCensus>,
}

pub trait ContextScenarioExt {
    /// Builds the population, synthesizes the cross layers and installs
    /// mobility and interventions as described by the [`Parameters`]
    /// property. Returns the cross-layer summary if cross layers were
    /// requested.
    ///
    /// Mobility without named regions moves crossers between the regions
    /// the cross layers link.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if the property is not set or
    /// mobility names a region pair other than the cross layers', and
    /// propagates any error from the individual steps.
    fn setup_scenario(&mut self) -> Result<Option<CrossLayerSummary>, IxaError>;

    /// Runs the configured number of days from the current day.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if the property is not set, and
    /// the error of an intervention that failed and stopped the run.
    fn run_scenario(&mut self) -> Result<(), IxaError>;

    fn scenario_report(&self, cross_layers: Option<CrossLayerSummary>) -> ScenarioReport;
}

fn parameters(context: &Context) -> Result<ScenarioParameters, IxaError> {
    context
        .get_global_property_value(Parameters)
        .cloned()
        .ok_or_else(|| IxaError::config("scenario parameters are not set"))
}

/// Crossers travel between the two regions their cross edges link.
fn follow_cross_layer_regions(
    mobility: &mut MobilityConfig,
    summary: &CrossLayerSummary,
) -> Result<(), IxaError> {
    let [(a, _), (b, _)] = summary.crossers.as_slice() else {
        return Ok(());
    };
    match (&mobility.region_a, &mobility.region_b) {
        (Some(x), Some(y)) => {
            if (x == a && y == b) || (x == b && y == a) {
                Ok(())
            } else {
                Err(IxaError::config(format!(
                    "mobility regions {x}/{y} differ from cross-layer regions {a}/{b}"
                )))
            }
        }
        _ => {
            mobility.region_a = Some(a.clone());
            mobility.region_b = Some(b.clone());
            Ok(())
        }
    }
}

impl ContextScenarioExt for Context {
    fn setup_scenario(&mut self) -> Result<Option<CrossLayerSummary>, IxaError> {
        let parameters = parameters(self)?;
        let mut population = build_population(&parameters.population)?;
        let summary = match &parameters.cross_layer {
            Some(config) => Some(synthesize_cross_layers(&mut population, config)?),
            None => None,
        };
        self.install_population(population)?;
        if let Some(expected) = parameters.host_population_size {
            self.check_population_size(expected)?;
        }
        if let Some(mut mobility) = parameters.mobility {
            if let Some(summary) = &summary {
                follow_cross_layer_regions(&mut mobility, summary)?;
            }
            self.install_mobility(mobility)?;
        }
        for intervention in parameters.interventions {
            self.add_intervention(intervention)?;
        }
        info!("scenario ready: {} layers", self.get_layer_keys().len());
        Ok(summary)
    }

    fn run_scenario(&mut self) -> Result<(), IxaError> {
        let n_days = parameters(self)?.n_days;
        info!("running {n_days} days");
        self.execute_days(n_days);
        match self.take_intervention_failure() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn scenario_report(&self, cross_layers: Option<CrossLayerSummary>) -> ScenarioReport {
        ScenarioReport {
            day: self.get_current_time(),
            cross_layers,
            travel: self.get_travel_summary(),
            interventions: self.get_intervention_states(),
            census: self.layer_census(),
        }
    }
}
