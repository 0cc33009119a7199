//! Typed, validated global configuration values.
//!
//! A global property is declared with [`define_global_property!`] and holds a
//! single `serde::Deserialize` value per `Context`. Values are set once, either
//! directly or from a JSON config file whose top-level object is keyed by the
//! property's name (`<crate>.<Property>`), and are validated when they are
//! set:
//!
//! ```json
//! { "ixa_crossborder.Parameters": { "seed": 8, "n_days": 10, ... } }
//! ```
use std::any::{Any, TypeId};
use std::fs;
use std::path::Path;

use log::{debug, trace};
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::IxaError;
use crate::{define_data_plugin, HashMap};

/// Defines a global property with the following parameters:
/// * `$global_property`: Name for the identifier type of the global property
/// * `$value`: The type of the property's value
/// * `$validate`: A function (or closure) that checks the validity of the property (optional)
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate: expr) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn name() -> String {
                let crate_name = module_path!().split("::").next().unwrap_or_default();
                format!("{}.{}", crate_name, stringify!($global_property))
            }

            fn validate(val: &$value) -> Result<(), $crate::error::IxaError> {
                $validate(val)
            }
        }
    };

    ($global_property: ident, $value: ty) => {
        $crate::define_global_property!($global_property, $value, |_| { Ok(()) });
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any + DeserializeOwned;

    fn name() -> String;

    /// Checks the value before it is stored.
    ///
    /// # Errors
    /// Returns `IxaError::ConfigurationError` describing the first problem found.
    fn validate(value: &Self::Value) -> Result<(), IxaError>;
}

#[derive(Default)]
struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer::default()
);

pub trait ContextGlobalPropertiesExt {
    /// Set the value of a global property.
    ///
    /// # Errors
    /// Fails if the value does not validate or the property is already set.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), IxaError>;

    /// Returns the value of a global property, or `None` if it was never set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Reads `file_name` as a JSON object and sets `property` from the entry
    /// named after it.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed, if it has no entry for the
    /// property, or if the value does not validate.
    fn load_global_property<T: GlobalProperty>(
        &mut self,
        property: T,
        file_name: &Path,
    ) -> Result<(), IxaError>;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), IxaError> {
        T::validate(&value)?;
        let container = &mut self
            .get_data_mut(GlobalPropertiesPlugin)
            .global_property_container;
        if container.contains_key(&TypeId::of::<T>()) {
            return Err(IxaError::config(format!(
                "global property {} is already set",
                T::name()
            )));
        }
        trace!("setting global property {}", T::name());
        container.insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.get_data(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T::Value>())
    }

    fn load_global_property<T: GlobalProperty>(
        &mut self,
        property: T,
        file_name: &Path,
    ) -> Result<(), IxaError> {
        debug!("loading global property {} from {}", T::name(), file_name.display());
        let contents = fs::read_to_string(file_name)?;
        let mut entries: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)?;
        let raw = entries.remove(&T::name()).ok_or_else(|| {
            IxaError::config(format!(
                "{} has no entry for global property {}",
                file_name.display(),
                T::name()
            ))
        })?;
        let value: T::Value = serde_json::from_value(raw)?;
        self.set_global_property_value(property, value)
    }
}
