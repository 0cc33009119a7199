//! The daily crosser mobility machine.
//!
//! Every crosser is either [`TravelState::AtHome`] or
//! [`TravelState::Away`]. Once per day, in the `First` execution phase, the
//! machine:
//!
//! 1. returns every away crosser whose return day has arrived, unless the host
//!    has them quarantined or isolated (their return waits for the first
//!    unheld day);
//! 2. while the outbound window is open, sends `round(n_home * frac)` of the
//!    crossers at home to the other region for a uniform number of days;
//! 3. recomputes every domestic edge weight from the new positions;
//! 4. switches cross-layer edges on for crossers who are away, matching the
//!    layer's travel purpose.
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::context::ExecutionPhase;
use crate::error::IxaError;
use crate::network::weights::ContextWeightsExt;
use crate::people::{people_mut, ContextPeopleExt, PersonId, RegionId};
use crate::random::{sample_multiple_from_known_length, ContextRandomExt};
use crate::{define_data_plugin, define_rng, Context};

define_rng!(MobilityRng);

fn default_travel_fraction() -> f64 {
    0.1
}

fn default_duration_min() -> u32 {
    1
}

fn default_duration_max() -> u32 {
    7
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MobilityConfig {
    /// Share of at-home crossers leaving each open day
    #[serde(default = "default_travel_fraction")]
    pub travel_fraction: f64,
    #[serde(default = "default_duration_min")]
    pub duration_min: u32,
    #[serde(default = "default_duration_max")]
    pub duration_max: u32,
    #[serde(default)]
    pub start_day: u32,
    /// Departures stop on this day...
    #[serde(default)]
    pub end_day_outbound: Option<u32>,
    /// ...and start again on this one.
    #[serde(default)]
    pub resume_day_outbound: Option<u32>,
    /// The two regions crossers move between. Defaults to the first two
    /// regions anyone lives in, the same pair cross-layer synthesis picks.
    #[serde(default)]
    pub region_a: Option<String>,
    #[serde(default)]
    pub region_b: Option<String>,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        MobilityConfig {
            travel_fraction: default_travel_fraction(),
            duration_min: default_duration_min(),
            duration_max: default_duration_max(),
            start_day: 0,
            end_day_outbound: None,
            resume_day_outbound: None,
            region_a: None,
            region_b: None,
        }
    }
}

impl MobilityConfig {
    /// # Errors
    /// Returns `IxaError::ConfigurationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), IxaError> {
        if self.duration_min < 1 {
            return Err(IxaError::config("duration_min must be at least 1"));
        }
        if self.duration_min > self.duration_max {
            return Err(IxaError::config(format!(
                "duration_min {} exceeds duration_max {}",
                self.duration_min, self.duration_max
            )));
        }
        if !(0.0..=1.0).contains(&self.travel_fraction) {
            return Err(IxaError::config(format!(
                "travel fraction must be in [0, 1], got {}",
                self.travel_fraction
            )));
        }
        if self.region_a.is_some() != self.region_b.is_some() {
            return Err(IxaError::config("region_a and region_b must be given together"));
        }
        Ok(())
    }

    /// Whether departures may happen on `day`.
    #[must_use]
    pub fn outbound_open(&self, day: u32) -> bool {
        day >= self.start_day
            && (self.end_day_outbound.is_none_or(|end| day < end)
                || self.resume_day_outbound.is_some_and(|resume| day >= resume))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TravelState {
    #[default]
    AtHome,
    Away {
        return_day: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TravelEvent {
    Departure {
        day: u32,
        person: PersonId,
        destination: RegionId,
        return_day: u32,
    },
    Return {
        day: u32,
        person: PersonId,
    },
}

/// Totals over the travel ledger.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TravelSummary {
    pub departures: usize,
    pub returns: usize,
    pub away: usize,
    /// Returns that were due but waited for a quarantine or isolation to end
    pub deferred_returns: usize,
}

#[derive(Default)]
struct MobilityData {
    config: MobilityConfig,
    pair: Option<(RegionId, RegionId)>,
    states: Vec<TravelState>,
    ledger: Vec<TravelEvent>,
    deferred_returns: usize,
}

define_data_plugin!(MobilityPlugin, MobilityData, MobilityData::default());

pub trait ContextMobilityExt {
    /// Validates `config` and registers the mobility machine as a daily
    /// process in the `First` phase, starting today.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` if the config is invalid, a
    /// region is unknown, no population is installed, or mobility is already
    /// installed.
    fn install_mobility(&mut self, config: MobilityConfig) -> Result<(), IxaError>;

    fn get_travel_state(&self, person: PersonId) -> TravelState;

    fn get_travel_ledger(&self) -> &[TravelEvent];

    fn get_travel_summary(&self) -> TravelSummary;
}

impl ContextMobilityExt for Context {
    fn install_mobility(&mut self, config: MobilityConfig) -> Result<(), IxaError> {
        config.validate()?;
        if mobility_installed(self) {
            return Err(IxaError::config("mobility is already installed"));
        }
        let people = self.people();
        if people.is_empty() {
            return Err(IxaError::config("mobility needs an installed population"));
        }
        let regions = people.regions();
        let pair = match (&config.region_a, &config.region_b) {
            (Some(a), Some(b)) => {
                let lookup = |name: &str| {
                    regions
                        .id_of(name)
                        .ok_or_else(|| IxaError::config(format!("unknown region {name}")))
                };
                (lookup(a)?, lookup(b)?)
            }
            _ => {
                let mut ids = regions
                    .iter()
                    .filter(|&region| people.iter().any(|p| people.country(p) == region));
                match (ids.next(), ids.next()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(IxaError::config("mobility needs two populated regions")),
                }
            }
        };
        if pair.0 == pair.1 {
            return Err(IxaError::config("mobility regions must differ"));
        }
        let n = people.len();

        info!(
            "installing mobility between {} and {}",
            regions.name(pair.0),
            regions.name(pair.1)
        );
        let data = self.get_data_mut(MobilityPlugin);
        data.config = config;
        data.pair = Some(pair);
        data.states = vec![TravelState::AtHome; n];
        self.add_daily_process(mobility_step, ExecutionPhase::First);
        Ok(())
    }

    fn get_travel_state(&self, person: PersonId) -> TravelState {
        self.get_data(MobilityPlugin)
            .and_then(|data| data.states.get(person.0).copied())
            .unwrap_or_default()
    }

    fn get_travel_ledger(&self) -> &[TravelEvent] {
        self.get_data(MobilityPlugin)
            .map(|data| data.ledger.as_slice())
            .unwrap_or_default()
    }

    fn get_travel_summary(&self) -> TravelSummary {
        let Some(data) = self.get_data(MobilityPlugin) else {
            return TravelSummary::default();
        };
        let mut summary = TravelSummary {
            deferred_returns: data.deferred_returns,
            ..TravelSummary::default()
        };
        for event in &data.ledger {
            match event {
                TravelEvent::Departure { .. } => summary.departures += 1,
                TravelEvent::Return { .. } => summary.returns += 1,
            }
        }
        summary.away = data
            .states
            .iter()
            .filter(|state| matches!(state, TravelState::Away { .. }))
            .count();
        summary
    }
}

pub(crate) fn mobility_installed(context: &Context) -> bool {
    context
        .get_data(MobilityPlugin)
        .is_some_and(|data| data.pair.is_some())
}

struct Departure {
    person: PersonId,
    destination: RegionId,
    return_day: u32,
}

/// The people due back today who are free to return, and how many due
/// returns are held back.
fn due_returns(context: &Context, day: u32) -> (Vec<PersonId>, usize) {
    let Some(data) = context.get_data(MobilityPlugin) else {
        return (Vec::new(), 0);
    };
    let people = context.people();
    let mut returning = Vec::new();
    let mut held = 0;
    for (index, state) in data.states.iter().enumerate() {
        if let TravelState::Away { return_day } = *state {
            if day >= return_day {
                let person = PersonId(index);
                if people.health(person).is_held() {
                    held += 1;
                } else {
                    returning.push(person);
                }
            }
        }
    }
    (returning, held)
}

fn plan_departures(context: &Context, day: u32) -> Vec<Departure> {
    let Some(data) = context.get_data(MobilityPlugin) else {
        return Vec::new();
    };
    let Some((a, b)) = data.pair else {
        return Vec::new();
    };
    if !data.config.outbound_open(day) {
        return Vec::new();
    }
    let people = context.people();
    let candidates: Vec<PersonId> = people
        .iter()
        .filter(|&p| {
            people.is_crosser(p)
                && data.states[p.0] == TravelState::AtHome
                && !people.health(p).dead
                && !people.health(p).is_held()
                && (people.country(p) == a || people.country(p) == b)
        })
        .collect();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let n = ((candidates.len() as f64 * data.config.travel_fraction + 0.5).floor() as usize)
        .min(candidates.len());
    let leaving = context.sample(MobilityRng, |rng| {
        sample_multiple_from_known_length(rng, candidates.iter().copied(), n)
    });

    let (min, max) = (data.config.duration_min, data.config.duration_max);
    leaving
        .into_iter()
        .map(|person| {
            let destination = if people.country(person) == a { b } else { a };
            let duration: u32 = context.sample_range(MobilityRng, min..=max);
            Departure {
                person,
                destination,
                return_day: day + duration,
            }
        })
        .collect()
}

fn mobility_step(context: &mut Context) {
    let Some(day) = context.get_current_day() else {
        trace!("mobility skipped at t={}", context.get_current_time());
        return;
    };

    let (returning, held) = due_returns(context, day);
    for &person in &returning {
        let country = context.get_person_country(person);
        people_mut(context).set_position(person, country);
    }
    {
        let data = context.get_data_mut(MobilityPlugin);
        data.deferred_returns += held;
        for &person in &returning {
            data.states[person.0] = TravelState::AtHome;
            data.ledger.push(TravelEvent::Return { day, person });
        }
    }

    let departures = plan_departures(context, day);
    for departure in &departures {
        people_mut(context).set_position(departure.person, departure.destination);
    }
    {
        let data = context.get_data_mut(MobilityPlugin);
        for departure in &departures {
            data.states[departure.person.0] = TravelState::Away {
                return_day: departure.return_day,
            };
            data.ledger.push(TravelEvent::Departure {
                day,
                person: departure.person,
                destination: departure.destination,
                return_day: departure.return_day,
            });
        }
    }
    debug!(
        "day {day}: {} returned, {} held abroad, {} departed",
        returning.len(),
        held,
        departures.len()
    );

    context.resync_domestic_weights();
    context.activate_cross_layers();
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::network::{ContactLayer, ContextNetworkExt, LayerKey};
    use crate::people::{install_people, HealthStatus, PeopleData, RegionRegistry, Sex};

    // 0..10 from A, 10..20 from B; the first four of each region are crossers.
    fn setup(config: MobilityConfig) -> Context {
        let mut regions = RegionRegistry::new();
        let a = regions.register("A");
        let b = regions.register("B");
        let mut people = PeopleData::new(regions);
        for i in 0..20 {
            let person = people.add_person(40, Sex::Female, if i < 10 { a } else { b });
            if i % 10 < 4 {
                people.mark_crosser(person, None);
            }
        }
        let mut context = Context::new();
        context.init_random(42);
        install_people(&mut context, people);

        let mut base = ContactLayer::new(LayerKey::Base, 1.0).unwrap();
        for i in 0..9 {
            base.add_edge(PersonId(i), PersonId(i + 1), 1.0).unwrap();
            base.add_edge(PersonId(i + 10), PersonId(i + 11), 1.0).unwrap();
        }
        context.add_layer(base).unwrap();
        let mut cross = ContactLayer::new(LayerKey::Cross, 0.6).unwrap();
        for i in 0..4 {
            cross.add_edge(PersonId(i), PersonId(15), 0.6).unwrap();
            cross.add_edge(PersonId(i + 10), PersonId(5), 0.6).unwrap();
        }
        context.add_layer(cross).unwrap();
        context.install_mobility(config).unwrap();
        context
    }

    fn everyone_leaves() -> MobilityConfig {
        MobilityConfig {
            travel_fraction: 1.0,
            duration_min: 2,
            duration_max: 2,
            ..MobilityConfig::default()
        }
    }

    fn hold(context: &mut Context, person: PersonId) {
        let status = HealthStatus {
            quarantined: true,
            ..context.get_health_status(person)
        };
        context.set_health_status(person, status);
    }

    #[test]
    fn outbound_window() {
        let config = MobilityConfig {
            start_day: 2,
            end_day_outbound: Some(5),
            resume_day_outbound: Some(8),
            ..MobilityConfig::default()
        };
        let open: Vec<u32> = (0..10).filter(|&day| config.outbound_open(day)).collect();
        assert_eq!(open, vec![2, 3, 4, 8, 9]);

        let config = MobilityConfig {
            end_day_outbound: Some(3),
            ..MobilityConfig::default()
        };
        assert!(config.outbound_open(2));
        assert!(!config.outbound_open(3));
        assert!(!config.outbound_open(100));
    }

    #[test]
    fn invalid_configs() {
        for config in [
            MobilityConfig {
                duration_min: 0,
                ..MobilityConfig::default()
            },
            MobilityConfig {
                duration_min: 5,
                duration_max: 4,
                ..MobilityConfig::default()
            },
            MobilityConfig {
                travel_fraction: -0.1,
                ..MobilityConfig::default()
            },
        ] {
            assert!(matches!(config.validate(), Err(IxaError::ConfigurationError(_))));
        }
        let mut context = Context::new();
        assert!(matches!(
            context.install_mobility(MobilityConfig::default()),
            Err(IxaError::ConfigurationError(_))
        ));
    }

    #[test]
    fn unknown_region_is_rejected() {
        let mut context = setup(MobilityConfig::default());
        let config = MobilityConfig {
            region_a: Some("A".to_string()),
            region_b: Some("Q".to_string()),
            ..MobilityConfig::default()
        };
        assert!(context.install_mobility(config).is_err());
    }

    #[test]
    fn default_pair_skips_empty_regions() {
        let mut regions = RegionRegistry::new();
        regions.register("A");
        let b = regions.register("B");
        let c = regions.register("C");
        let mut people = PeopleData::new(regions);
        for i in 0..8 {
            let person = people.add_person(40, Sex::Male, if i < 4 { b } else { c });
            if i % 4 == 0 {
                people.mark_crosser(person, None);
            }
        }
        let mut context = Context::new();
        context.init_random(42);
        install_people(&mut context, people);
        context.install_mobility(everyone_leaves()).unwrap();

        context.execute_days(1);
        assert_eq!(context.get_travel_summary().departures, 2);
        assert_eq!(context.get_person_position(PersonId(0)), c);
        assert_eq!(context.get_person_position(PersonId(4)), b);
    }

    #[test]
    fn crossers_leave_and_return() {
        let mut context = setup(everyone_leaves());
        context.execute_days(1);

        let summary = context.get_travel_summary();
        assert_eq!(summary.departures, 8);
        assert_eq!(summary.away, 8);
        for i in [0, 1, 2, 3, 10, 11, 12, 13] {
            let person = PersonId(i);
            assert_ne!(context.get_person_position(person), context.get_person_country(person));
            assert_eq!(context.get_travel_state(person), TravelState::Away { return_day: 2 });
        }
        // Non-crossers never move.
        for i in [4, 9, 14, 19] {
            let person = PersonId(i);
            assert_eq!(context.get_person_position(person), context.get_person_country(person));
        }

        // Day 1 has nobody at home to send; day 2 brings everyone back and
        // sends them out again.
        context.execute_days(2);
        let returns: Vec<_> = context
            .get_travel_ledger()
            .iter()
            .filter_map(|event| match event {
                TravelEvent::Return { day, .. } => Some(*day),
                TravelEvent::Departure { .. } => None,
            })
            .collect();
        assert_eq!(returns, vec![2; 8]);
        assert_eq!(context.get_travel_summary().departures, 16);
    }

    #[test]
    fn departures_use_rounded_fraction() {
        let mut context = setup(MobilityConfig {
            travel_fraction: 0.3,
            ..everyone_leaves()
        });
        context.execute_days(1);
        // round(8 * 0.3) = 2
        assert_eq!(context.get_travel_summary().departures, 2);
    }

    #[test]
    fn weights_follow_positions() {
        let mut context = setup(everyone_leaves());
        context.execute_days(1);

        let base = context.get_layer(&LayerKey::Base).unwrap();
        for edge in base.edges() {
            let away = context.people().is_away(edge.source) || context.people().is_away(edge.target);
            assert_eq!(edge.weight == 0.0, away);
        }
        let cross = context.get_layer(&LayerKey::Cross).unwrap();
        assert!(cross.edges().iter().all(|edge| (edge.weight - 0.6).abs() < f32::EPSILON));
    }

    #[test]
    fn held_agents_stay_away() {
        let mut context = setup(MobilityConfig {
            end_day_outbound: Some(1),
            ..everyone_leaves()
        });
        context.execute_days(1);
        let person = PersonId(0);
        let abroad = context.get_person_position(person);
        hold(&mut context, person);

        // Day 2 is the return day; the quarantined agent stays put.
        context.execute_days(2);
        assert_eq!(context.get_person_position(person), abroad);
        assert_eq!(context.get_travel_state(person), TravelState::Away { return_day: 2 });
        assert!(context.get_travel_summary().deferred_returns >= 1);

        // Released on day 3, home the same day.
        let status = HealthStatus {
            quarantined: false,
            ..context.get_health_status(person)
        };
        context.set_health_status(person, status);
        context.execute_days(1);
        assert_eq!(context.get_person_position(person), context.get_person_country(person));
        assert!(context
            .get_travel_ledger()
            .contains(&TravelEvent::Return { day: 3, person }));
    }

    #[test]
    fn held_and_dead_agents_do_not_depart() {
        let mut context = setup(everyone_leaves());
        hold(&mut context, PersonId(1));
        let dead = HealthStatus {
            dead: true,
            ..HealthStatus::default()
        };
        context.set_health_status(PersonId(2), dead);
        context.execute_days(1);
        assert_eq!(context.get_travel_summary().departures, 6);
        assert_eq!(context.get_travel_state(PersonId(1)), TravelState::AtHome);
        assert_eq!(context.get_travel_state(PersonId(2)), TravelState::AtHome);
    }

    #[test]
    fn same_seed_same_ledger() {
        let run = || {
            let mut context = setup(MobilityConfig {
                travel_fraction: 0.5,
                duration_min: 1,
                duration_max: 4,
                ..MobilityConfig::default()
            });
            context.execute_days(10);
            context.get_travel_ledger().to_vec()
        };
        assert_eq!(run(), run());
    }
}
