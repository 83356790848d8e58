//! Operator input: `s` queues a screenshot, `n` advances to the next URL.
//!
//! One listener thread produces, async tasks consume. The advance signal is
//! single-slot and latest-wins; screenshot requests queue in FIFO order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capture::{advance_channel, AdvanceSignal, AdvanceTrigger};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotRequest {
    /// Capture whatever page is current when the request is served.
    Capture,
    /// Ends the consumer after everything queued before it.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    Screenshot,
    Advance,
}

pub fn action_for_key(key: char) -> Option<OperatorAction> {
    match key.to_ascii_lowercase() {
        's' => Some(OperatorAction::Screenshot),
        'n' => Some(OperatorAction::Advance),
        _ => None,
    }
}

/// Producer side of both operator channels. Cheap to clone into a listener.
#[derive(Debug, Clone)]
pub struct OperatorSignals {
    advance: AdvanceTrigger,
    screenshots: mpsc::UnboundedSender<ScreenshotRequest>,
}

impl OperatorSignals {
    pub fn new(
        advance: AdvanceTrigger,
        screenshots: mpsc::UnboundedSender<ScreenshotRequest>,
    ) -> Self {
        Self {
            advance,
            screenshots,
        }
    }

    pub fn request_screenshot(&self) {
        if self.screenshots.send(ScreenshotRequest::Capture).is_err() {
            warn!("operator: screenshot consumer is gone; request dropped");
        }
    }

    pub fn advance(&self) {
        self.advance.fire();
    }

    /// Queue the sentinel that ends the screenshot consumer.
    pub fn stop_screenshots(&self) {
        let _ = self.screenshots.send(ScreenshotRequest::Stop);
    }

    /// Apply one key press. Returns the action taken, if any.
    pub fn handle_key(&self, key: char) -> Option<OperatorAction> {
        let action = action_for_key(key)?;
        match action {
            OperatorAction::Screenshot => {
                info!("operator: screenshot requested");
                self.request_screenshot();
            }
            OperatorAction::Advance => {
                info!("operator: next URL");
                self.advance();
            }
        }
        Some(action)
    }
}

/// Consumer halves handed to the run loop.
pub struct OperatorInbox {
    pub advance: AdvanceSignal,
    pub screenshots: mpsc::UnboundedReceiver<ScreenshotRequest>,
}

pub fn operator_channels() -> (OperatorSignals, OperatorInbox) {
    let (trigger, advance) = advance_channel();
    let (tx, rx) = mpsc::unbounded_channel();
    (
        OperatorSignals::new(trigger, tx),
        OperatorInbox {
            advance,
            screenshots: rx,
        },
    )
}

/// Background keyboard listener. Stops reacting once [`KeyListener::stop`]
/// is called or the listener is dropped.
pub struct KeyListener {
    stop: Arc<AtomicBool>,
}

impl KeyListener {
    #[cfg(not(feature = "global-hotkeys"))]
    pub fn start(signals: OperatorSignals) -> Self {
        use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEventKind};
        use std::time::Duration;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        std::thread::spawn(move || {
            info!(
                "operator: press 's' for a screenshot, 'n' for the next URL \
                 (then Enter if the terminal is line-buffered)"
            );
            while !stop_thread.load(Ordering::SeqCst) {
                match event::poll(Duration::from_millis(100)) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        warn!("operator: failed to poll terminal input: {}", e);
                        break;
                    }
                }
                match event::read() {
                    Ok(TermEvent::Key(key)) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if let KeyCode::Char(c) = key.code {
                            signals.handle_key(c);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("operator: failed to read terminal input: {}", e);
                        break;
                    }
                }
            }
            debug!("operator: terminal listener stopped");
        });
        Self { stop }
    }

    /// System-wide listener; needs Accessibility permission on macOS.
    #[cfg(feature = "global-hotkeys")]
    pub fn start(signals: OperatorSignals) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        std::thread::spawn(move || {
            info!("operator: global hot-keys active ('s' screenshot, 'n' next URL)");
            let callback = move |event: rdev::Event| {
                if stop_thread.load(Ordering::SeqCst) {
                    return;
                }
                match event.event_type {
                    rdev::EventType::KeyPress(rdev::Key::KeyS) => {
                        signals.handle_key('s');
                    }
                    rdev::EventType::KeyPress(rdev::Key::KeyN) => {
                        signals.handle_key('n');
                    }
                    _ => {}
                }
            };
            if let Err(e) = rdev::listen(callback) {
                warn!("operator: global key listener failed: {:?}", e);
            }
        });
        Self { stop }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}
