use crate::engine::EngineEvent;
use crate::indicator::BadgeColor;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

/// Repeating timer re-running matching on the last active tab
pub struct RecheckScheduler {
    interval: Duration,
    events: mpsc::UnboundedSender<EngineEvent>,
    handle: Option<JoinHandle<()>>,
}

impl RecheckScheduler {
    pub fn new(interval: Duration, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            interval,
            events,
            handle: None,
        }
    }

    /// Re-arm the timer according to `enabled`, returning the badge colour to use
    pub fn set_enabled(&mut self, enabled: bool) -> BadgeColor {
        self.disable();
        if enabled {
            self.enable();
        }
        self.badge_color()
    }

    fn enable(&mut self) {
        let events = self.events.clone();
        let period = self.interval;

        self.handle = Some(tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            loop {
                timer.tick().await;
                if events.send(EngineEvent::Recheck).is_err() {
                    debug!("Engine stopped, ending rule recheck");
                    break;
                }
            }
        }));
        info!("Activate interval for rule rechecking ({:?})", period);
    }

    /// Cancel the timer; returns false when none was running
    pub fn disable(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                info!("Deactivate interval for rule rechecking");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn badge_color(&self) -> BadgeColor {
        if self.is_active() {
            BadgeColor::INTERVAL
        } else {
            BadgeColor::DEFAULT
        }
    }
}

impl Drop for RecheckScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
