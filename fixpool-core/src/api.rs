//! The API of fixpool-core.

mod configuration;
mod error;
mod platform;
mod pool;

pub use configuration::{Configuration, DEFAULT_BLOCK_ALIGNMENT};
pub use error::{ConfigurationError, Error};
pub use platform::Platform;
pub use pool::{FixedPool, FreeNode};
