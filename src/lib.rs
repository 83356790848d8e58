pub mod capture;
pub mod core;
pub mod extraction;
pub mod features;
pub mod filters;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::{ScoutConfig, ScoutError, SessionError};

pub use extraction::{extract, extract_json_candidates, select_top};
pub use filters::{is_relevant, score_url};
