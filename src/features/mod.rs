pub mod operator;
pub mod persistence;
pub mod profile_api;
pub mod screenshots;

pub use operator::{
    operator_channels, KeyListener, OperatorInbox, OperatorSignals, ScreenshotRequest,
};
pub use profile_api::ProfileApiClient;
pub use screenshots::{run_screenshot_consumer, ScreenshotTaker};
