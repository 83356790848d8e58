pub mod run;
pub mod visit;

pub use run::{read_url_list, run_urls, RunReport};
pub use visit::{visit_url, VisitOptions, VisitSummary};
