pub mod config;
pub mod error;
pub mod types;

pub use config::ScoutConfig;
pub use error::{ScoutError, SessionError};
