pub mod blocklist;
pub mod body_signal;
pub mod url_relevance;

pub use body_signal::BodyGate;
pub use url_relevance::{is_relevant, score_url, RelevanceGate, RelevancePolicy};
