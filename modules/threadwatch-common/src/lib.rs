pub mod config;
pub mod driver;
pub mod error;
pub mod types;

pub use config::{Config, RevealTunables};
pub use driver::*;
pub use error::{DriverError, WatchError};
pub use types::*;
