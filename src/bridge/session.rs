//! Browser session shared by the WebSocket handler and the engine
//!
//! One browser connects at a time. Requests are correlated with replies by
//! id; ports route pushed messages to the `PageConnection` that opened them.

use super::frame::{HostCommand, Inbound, Outbound};
use crate::channel::{
    ChannelError, PageChannel, PageConnection, PagePush, PageReply, PageRequest, PortSink,
};
use crate::engine::EngineHandle;
use crate::fill::ScreenCapture;
use crate::indicator::{BadgeColor, Indicator};
use crate::report::Notifier;
use crate::tab::TabId;
use anyhow::anyhow;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

struct Shared {
    outbound: Mutex<Option<(u64, mpsc::UnboundedSender<Outbound>)>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    ports: Mutex<HashMap<u64, mpsc::UnboundedSender<PagePush>>>,
    next_id: AtomicU64,
    timeout: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, frame: Outbound) -> bool {
        match lock(&self.outbound).as_ref() {
            Some((_, sender)) => sender.send(frame).is_ok(),
            None => {
                debug!("No browser connected, dropping {:?}", frame);
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                outbound: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                ports: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                timeout,
            }),
        }
    }

    /// Make a new browser connection the current one
    pub fn attach(&self) -> (u64, mpsc::UnboundedReceiver<Outbound>) {
        let session = self.shared.next_id();
        let (sender, receiver) = mpsc::unbounded_channel();
        if lock(&self.shared.outbound)
            .replace((session, sender))
            .is_some()
        {
            info!("Browser reconnected, replacing previous session");
            self.fail_in_flight();
        }
        (session, receiver)
    }

    /// Forget `session` if it is still the current one, failing everything in flight
    pub fn detach(&self, session: u64) {
        let mut outbound = lock(&self.shared.outbound);
        if outbound.as_ref().map(|(id, _)| *id) != Some(session) {
            return;
        }
        *outbound = None;
        drop(outbound);

        self.fail_in_flight();
        info!("Browser session {} detached", session);
    }

    /// Dropped waiters and port senders surface as `ChannelError::Closed`
    fn fail_in_flight(&self) {
        lock(&self.shared.pending).clear();
        lock(&self.shared.ports).clear();
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.outbound).is_some()
    }

    pub fn send(&self, frame: Outbound) -> bool {
        self.shared.send(frame)
    }

    /// Route a frame received from the browser
    pub fn dispatch(&self, frame: Inbound, engine: &EngineHandle) {
        match frame {
            Inbound::Reply { id, body } => match lock(&self.shared.pending).remove(&id) {
                Some(waiter) => {
                    let _ = waiter.send(body);
                }
                None => debug!("Late reply {} ignored", id),
            },
            Inbound::Push { port, body } => match lock(&self.shared.ports).get(&port) {
                Some(sender) => {
                    let _ = sender.send(body);
                }
                None => debug!("Push for closed port {} ignored", port),
            },
            Inbound::PortClosed { port } => {
                lock(&self.shared.ports).remove(&port);
            }
            Inbound::Event { id: None, event } => {
                if !engine.send(event) {
                    warn!("Engine stopped, dropping browser event");
                }
            }
            Inbound::Event {
                id: Some(id),
                event,
            } => {
                // queued here so the engine sees events in arrival order
                let Some(answer) = engine.queue_request(event) else {
                    warn!("Engine stopped, answering request {} with null", id);
                    self.send(Outbound::Reply {
                        id,
                        body: Value::Null,
                    });
                    return;
                };
                let bridge = self.clone();
                tokio::spawn(async move {
                    let body = answer.await.unwrap_or(Value::Null);
                    bridge.send(Outbound::Reply { id, body });
                });
            }
        }
    }

    fn host(&self, command: HostCommand) -> bool {
        self.send(Outbound::Host { command })
    }
}

#[async_trait::async_trait]
impl PageChannel for Bridge {
    async fn post(&self, tab: TabId, request: PageRequest) -> Result<(), ChannelError> {
        let frame = Outbound::Post {
            tab,
            port: None,
            body: request,
        };
        if self.send(frame) {
            Ok(())
        } else {
            Err(ChannelError::Unreachable(tab))
        }
    }

    async fn request(&self, tab: TabId, request: PageRequest) -> Result<PageReply, ChannelError> {
        let id = self.shared.next_id();
        let action = request.action();
        let (waiter, reply) = oneshot::channel();
        lock(&self.shared.pending).insert(id, waiter);

        if !self.send(Outbound::Request {
            id,
            tab,
            body: request,
        }) {
            lock(&self.shared.pending).remove(&id);
            return Err(ChannelError::Unreachable(tab));
        }

        let body = match tokio::time::timeout(self.shared.timeout, reply).await {
            Ok(Ok(body)) => body,
            Ok(Err(_)) => return Err(ChannelError::Closed(tab)),
            Err(_) => {
                lock(&self.shared.pending).remove(&id);
                return Err(ChannelError::Timeout(tab, self.shared.timeout));
            }
        };

        serde_json::from_value(body.clone()).map_err(|e| {
            debug!("Malformed reply to '{}': {}", action, e);
            ChannelError::UnexpectedReply {
                request: action,
                reply: body.to_string(),
            }
        })
    }

    async fn connect(&self, tab: TabId) -> Result<PageConnection, ChannelError> {
        let port = self.shared.next_id();
        let (sender, incoming) = mpsc::unbounded_channel();
        lock(&self.shared.ports).insert(port, sender);

        if !self.send(Outbound::Connect { port, tab }) {
            lock(&self.shared.ports).remove(&port);
            return Err(ChannelError::Unreachable(tab));
        }

        let sink = BridgePort {
            port,
            tab,
            shared: Arc::clone(&self.shared),
        };
        Ok(PageConnection::new(tab, sink, incoming))
    }
}

struct BridgePort {
    port: u64,
    tab: TabId,
    shared: Arc<Shared>,
}

impl PortSink for BridgePort {
    fn post(&self, request: PageRequest) -> Result<(), ChannelError> {
        let frame = Outbound::Post {
            tab: self.tab,
            port: Some(self.port),
            body: request,
        };
        if self.shared.send(frame) {
            Ok(())
        } else {
            Err(ChannelError::Closed(self.tab))
        }
    }
}

impl Drop for BridgePort {
    fn drop(&mut self) {
        if lock(&self.shared.ports).remove(&self.port).is_some() {
            self.shared.send(Outbound::Disconnect { port: self.port });
        }
    }
}

#[async_trait::async_trait]
impl Indicator for Bridge {
    async fn set_badge(&self, tab: TabId, text: &str, color: BadgeColor) {
        self.host(HostCommand::SetBadge {
            tab,
            text: text.to_string(),
            color,
        });
    }

    async fn set_picker(&self, tab: TabId, enabled: bool) {
        self.host(HostCommand::SetPopup { tab, enabled });
    }
}

#[async_trait::async_trait]
impl Notifier for Bridge {
    async fn notify(&self, message: &str) {
        info!("🔔 {}", message);
        self.host(HostCommand::Notify {
            message: message.to_string(),
        });
    }
}

#[async_trait::async_trait]
impl ScreenCapture for Bridge {
    async fn capture(&self, window_id: u32, quality: u8, filename: &str) -> anyhow::Result<()> {
        let sent = self.host(HostCommand::CaptureScreenshot {
            window: window_id,
            quality,
            filename: filename.to_string(),
        });
        if sent {
            Ok(())
        } else {
            Err(anyhow!("no browser connected to capture window {}", window_id))
        }
    }
}
