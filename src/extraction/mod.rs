pub mod json_recovery;
pub mod keywords;
pub mod ranking;
pub mod repair;
pub mod scripts;

pub use json_recovery::extract_json_candidates;
pub use keywords::{extract, KeywordExtractor};
pub use ranking::select_top;
pub use repair::{HeuristicRepair, JsonRepair, StrictJson};
