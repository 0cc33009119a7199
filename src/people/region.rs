use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// A region (country) in the synthetic population.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub(crate) usize);

impl RegionId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps region names to ids, in the order the regions were configured.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionRegistry {
    names: Vec<String>,
}

impl RegionRegistry {
    #[must_use]
    pub const fn new() -> Self {
        RegionRegistry { names: Vec::new() }
    }

    /// Returns the id for `name`, registering it if it is new.
    pub fn register(&mut self, name: &str) -> RegionId {
        match self.id_of(name) {
            Some(id) => id,
            None => {
                self.names.push(name.to_string());
                RegionId(self.names.len() - 1)
            }
        }
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<RegionId> {
        self.names.iter().position(|n| n == name).map(RegionId)
    }

    /// # Panics
    /// Panics if `region` was not issued by this registry.
    #[must_use]
    pub fn name(&self, region: RegionId) -> &str {
        &self.names[region.0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RegionId> + '_ {
        (0..self.names.len()).map(RegionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut regions = RegionRegistry::new();
        let a = regions.register("A");
        let b = regions.register("B");
        assert_eq!(regions.register("A"), a);
        assert_ne!(a, b);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions.name(b), "B");
        assert_eq!(regions.id_of("C"), None);
        assert_eq!(regions.iter().collect::<Vec<_>>(), vec![a, b]);
    }
}
