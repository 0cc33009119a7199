//! Named, independently seeded random number streams.
//!
//! Every consumer of randomness draws from its own stream (see
//! [`define_rng!`]). Each stream is seeded from the context's base seed plus a
//! hash of the stream's name, so adding a draw to one process never perturbs
//! the draws of another.
mod context_ext;
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;
pub use sampling_algorithms::{sample_multiple_from_known_length, sample_with_replacement};

use crate::rand::SeedableRng;
use crate::{define_data_plugin, HashMap};

pub trait RngId: Copy + Clone {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// `rng_holders` sits in a RefCell so that sampling only needs `&Context`.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        rng_holders: RefCell::new(HashMap::default()),
    }
);
