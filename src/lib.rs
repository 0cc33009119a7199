//! Multi-region contact networks with cross-border mobility
//!
//! This crate builds and evolves the contact network that an agent-based
//! disease model transmits over. Everything hangs off a [`Context`], which
//! keeps simulated time, runs scheduled plans and daily processes in a fixed
//! phase order, and holds each module's data.
//!
//! A scenario is assembled from these modules:
//! * [`population`] generates agents split across regions and the
//!   region-internal contact layers (preferential attachment, uniform random
//!   or clustered).
//! * [`cross_layer`] picks the agents who cross the border and synthesizes the
//!   static cross-region layers, optionally split by travel purpose.
//! * [`mobility`] is a daily process that sends crossers across the border and
//!   brings them back, keeping every edge weight consistent with where people
//!   are.
//! * [`interventions`] close, thin out, scale or cap layers in a region on
//!   given days.
//!
//! The host engine reads the layers (see [`network`]) and writes per-agent
//! health flags (see [`people`]) in its own daily process, which runs after
//! mobility and the interventions.
pub mod context;
pub use context::{Context, ExecutionPhase};

pub mod cross_layer;
pub use cross_layer::{synthesize_cross_layers, CrossLayerConfig, CrossLayerSummary};

pub mod error;
pub use error::IxaError;

pub mod global_properties;
pub use global_properties::{ContextGlobalPropertiesExt, GlobalProperty};

mod hashing;
pub use hashing::{HashMap, HashSet};

pub mod interventions;
pub use interventions::{ContextInterventionsExt, InterventionConfig, InterventionState};

pub mod log;

pub mod mobility;
pub use mobility::{ContextMobilityExt, MobilityConfig, TravelEvent, TravelState};

pub mod network;
pub use network::weights::ContextWeightsExt;
pub use network::{ContactLayer, ContextNetworkExt, Edge, LayerKey};

pub mod people;
pub use people::{ContextPeopleExt, HealthStatus, PersonId, RegionId, TravelPurpose};

pub mod plan;

pub mod population;
pub use population::{build_population, ContextPopulationExt, Population, PopulationConfig};

pub mod random;
pub use random::ContextRandomExt;

pub mod runner;
pub use runner::{run_with_args, run_with_custom_args, BaseArgs};

pub mod scenario;
pub use scenario::{ContextScenarioExt, Parameters, ScenarioParameters};

// Re-exports for use by macros
pub use paste;
pub use rand;
