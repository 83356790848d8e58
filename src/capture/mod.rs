pub mod cdp;
pub mod feed;
pub mod session;

pub use feed::{
    NoBody, ObservedResponse, ResponseBody, ResponseSender, ResponseSubscription, StaticBody,
};
pub use session::{
    advance_channel, AdvanceSignal, AdvanceTrigger, BodyRead, CapturePolicy, CaptureSession,
    SessionState,
};
