pub mod alt_fetch;
pub mod antibot;
pub mod browser_manager;

pub use alt_fetch::AltFetcher;
pub use browser_manager::BrowserSession;
