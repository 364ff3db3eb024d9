//! Bundled camera drivers.

mod synthetic;

pub use synthetic::{SyntheticCamera, SyntheticConfig};
