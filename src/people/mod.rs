//! Agents and their attributes.
//!
//! People are indexed by [`PersonId`] and stored column-wise in
//! [`PeopleData`]. Attributes fall into three ownership groups:
//!
//! * demographic (`age`, `sex`, `country`) are fixed when the population is
//!   built;
//! * travel (`crosser`, `purpose`) are set once by cross-layer synthesis, and
//!   `position` is written only by the mobility machine;
//! * health flags belong to the host, which updates them with
//!   [`ContextPeopleExt::set_health_status`]. This crate only reads them.
mod region;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub use region::{RegionId, RegionRegistry};

use crate::{define_data_plugin, Context};

/// Identifies a single agent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub(crate) usize);

impl PersonId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

/// Why a crosser travels. Only assigned by multilayer synthesis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelPurpose {
    Work,
    Visit,
    Undocumented,
}

impl TravelPurpose {
    pub const ALL: [TravelPurpose; 3] = [
        TravelPurpose::Work,
        TravelPurpose::Visit,
        TravelPurpose::Undocumented,
    ];
}

/// Health flags maintained by the host's disease engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealthStatus {
    pub susceptible: bool,
    pub infectious: bool,
    pub quarantined: bool,
    pub isolated: bool,
    pub dead: bool,
}

impl HealthStatus {
    /// A quarantined or isolated agent may not move between regions.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.quarantined || self.isolated
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus {
            susceptible: true,
            infectious: false,
            quarantined: false,
            isolated: false,
            dead: false,
        }
    }
}

/// Column-wise agent attribute tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeopleData {
    regions: RegionRegistry,
    age: Vec<u8>,
    sex: Vec<Sex>,
    country: Vec<RegionId>,
    position: Vec<RegionId>,
    crosser: Vec<bool>,
    purpose: Vec<Option<TravelPurpose>>,
    health: Vec<HealthStatus>,
}

static NO_PEOPLE: PeopleData = PeopleData::new(RegionRegistry::new());

impl PeopleData {
    #[must_use]
    pub const fn new(regions: RegionRegistry) -> Self {
        PeopleData {
            regions,
            age: Vec::new(),
            sex: Vec::new(),
            country: Vec::new(),
            position: Vec::new(),
            crosser: Vec::new(),
            purpose: Vec::new(),
            health: Vec::new(),
        }
    }

    pub(crate) fn add_person(&mut self, age: u8, sex: Sex, country: RegionId) -> PersonId {
        let id = PersonId(self.age.len());
        self.age.push(age);
        self.sex.push(sex);
        self.country.push(country);
        self.position.push(country);
        self.crosser.push(false);
        self.purpose.push(None);
        self.health.push(HealthStatus::default());
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.age.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.age.is_empty()
    }

    #[must_use]
    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = PersonId> {
        (0..self.len()).map(PersonId)
    }

    /// Everyone whose origin is `country`, in id order.
    #[must_use]
    pub fn people_from(&self, country: RegionId) -> Vec<PersonId> {
        self.iter().filter(|&p| self.country(p) == country).collect()
    }

    #[must_use]
    pub fn age(&self, person: PersonId) -> u8 {
        self.age[person.0]
    }

    #[must_use]
    pub fn sex(&self, person: PersonId) -> Sex {
        self.sex[person.0]
    }

    #[must_use]
    pub fn country(&self, person: PersonId) -> RegionId {
        self.country[person.0]
    }

    #[must_use]
    pub fn position(&self, person: PersonId) -> RegionId {
        self.position[person.0]
    }

    #[must_use]
    pub fn is_crosser(&self, person: PersonId) -> bool {
        self.crosser[person.0]
    }

    #[must_use]
    pub fn purpose(&self, person: PersonId) -> Option<TravelPurpose> {
        self.purpose[person.0]
    }

    #[must_use]
    pub fn health(&self, person: PersonId) -> HealthStatus {
        self.health[person.0]
    }

    /// True while the agent is outside its country of origin.
    #[must_use]
    pub fn is_away(&self, person: PersonId) -> bool {
        self.position[person.0] != self.country[person.0]
    }

    pub(crate) fn set_position(&mut self, person: PersonId, region: RegionId) {
        self.position[person.0] = region;
    }

    pub(crate) fn mark_crosser(&mut self, person: PersonId, purpose: Option<TravelPurpose>) {
        self.crosser[person.0] = true;
        self.purpose[person.0] = purpose;
    }

    pub(crate) fn set_health(&mut self, person: PersonId, status: HealthStatus) {
        self.health[person.0] = status;
    }
}

define_data_plugin!(PeoplePlugin, PeopleData, PeopleData::default());

/// Read access to agents for the host, and the host's write access to health
/// flags.
///
/// The accessors panic if `person` does not exist.
pub trait ContextPeopleExt {
    /// The installed population, or an empty one if none was installed yet.
    fn people(&self) -> &PeopleData;
    fn get_current_population(&self) -> usize;
    fn get_regions(&self) -> &RegionRegistry;
    fn get_person_age(&self, person: PersonId) -> u8;
    fn get_person_sex(&self, person: PersonId) -> Sex;
    fn get_person_country(&self, person: PersonId) -> RegionId;
    fn get_person_position(&self, person: PersonId) -> RegionId;
    fn is_crosser(&self, person: PersonId) -> bool;
    fn get_travel_purpose(&self, person: PersonId) -> Option<TravelPurpose>;
    fn get_health_status(&self, person: PersonId) -> HealthStatus;
    fn set_health_status(&mut self, person: PersonId, status: HealthStatus);
}

impl ContextPeopleExt for Context {
    fn people(&self) -> &PeopleData {
        self.get_data(PeoplePlugin).unwrap_or(&NO_PEOPLE)
    }

    fn get_current_population(&self) -> usize {
        self.people().len()
    }

    fn get_regions(&self) -> &RegionRegistry {
        self.people().regions()
    }

    fn get_person_age(&self, person: PersonId) -> u8 {
        self.people().age(person)
    }

    fn get_person_sex(&self, person: PersonId) -> Sex {
        self.people().sex(person)
    }

    fn get_person_country(&self, person: PersonId) -> RegionId {
        self.people().country(person)
    }

    fn get_person_position(&self, person: PersonId) -> RegionId {
        self.people().position(person)
    }

    fn is_crosser(&self, person: PersonId) -> bool {
        self.people().is_crosser(person)
    }

    fn get_travel_purpose(&self, person: PersonId) -> Option<TravelPurpose> {
        self.people().purpose(person)
    }

    fn get_health_status(&self, person: PersonId) -> HealthStatus {
        self.people().health(person)
    }

    fn set_health_status(&mut self, person: PersonId, status: HealthStatus) {
        self.get_data_mut(PeoplePlugin).set_health(person, status);
    }
}

pub(crate) fn people_mut(context: &mut Context) -> &mut PeopleData {
    context.get_data_mut(PeoplePlugin)
}

pub(crate) fn install_people(context: &mut Context, people: PeopleData) {
    *context.get_data_mut(PeoplePlugin) = people;
}
