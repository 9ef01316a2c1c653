use crate::protocol::channel::{ChannelError, FrameChannel};
use crate::protocol::{FrameContext, MessageBus};
use shared_types::{OutboundMessage, QueuedMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Frame channel backed by a queue the host bridge drains and relays with
/// `postMessage`. When the bridge stops draining, the oldest messages are
/// dropped once `capacity` is reached.
pub struct OutboxChannel {
    queue: std::sync::Mutex<VecDeque<QueuedMessage>>,
    capacity: usize,
    mounted: AtomicBool,
    detached: AtomicBool,
}

impl OutboxChannel {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: std::sync::Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            mounted: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }

    pub fn mark_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        self.clear();
    }

    pub fn drain(&self) -> Vec<QueuedMessage> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.drain(..).collect()
    }

    fn clear(&self) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl FrameChannel for OutboxChannel {
    fn post_message(&self, message: &OutboundMessage, target_origin: &str) -> Result<(), ChannelError> {
        if self.detached.load(Ordering::SeqCst) {
            return Err(ChannelError::Detached);
        }
        if !self.mounted.load(Ordering::SeqCst) {
            return Err(ChannelError::FrameUnavailable);
        }

        let message = serde_json::to_value(message).map_err(|e| {
            tracing::error!("Failed to serialize {}: {}", message.type_name(), e);
            ChannelError::FrameUnavailable
        })?;
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        while queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::debug!("Outbox full, dropping undrained {}", dropped.message["type"]);
            }
        }
        queue.push_back(QueuedMessage {
            target_origin: target_origin.to_string(),
            message,
        });
        Ok(())
    }
}

pub struct FrameSession {
    pub context: FrameContext,
    pub invitation_url: String,
    pub channel: Arc<OutboxChannel>,
    reloads: u32,
    last_active: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReloadError {
    #[error("Frame session not found")]
    NotFound,
    #[error("Template failed to load after {0} attempts")]
    LimitReached(u32),
}

/// Mounted template frames, keyed by session id. A session lives from mount
/// to unmount, or until it has been idle longer than the sweep allows;
/// closing it detaches the channel and aborts pending deliveries.
#[derive(Clone)]
pub struct FrameSessions {
    sessions: Arc<Mutex<HashMap<String, FrameSession>>>,
    active_deliveries: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    max_reloads: u32,
    outbox_capacity: usize,
}

impl FrameSessions {
    pub fn new(max_reloads: u32, outbox_capacity: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            active_deliveries: Arc::new(Mutex::new(HashMap::new())),
            max_reloads,
            outbox_capacity,
        }
    }

    pub fn max_reloads(&self) -> u32 {
        self.max_reloads
    }

    pub async fn open(&self, context: FrameContext, invitation_url: String) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            "Opened frame session {} for guest {} of event {}",
            session_id,
            context.guest_public_id,
            context.event_public_id
        );

        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id.clone(),
            FrameSession {
                context,
                invitation_url,
                channel: Arc::new(OutboxChannel::with_capacity(self.outbox_capacity)),
                reloads: 0,
                last_active: Instant::now(),
            },
        );
        session_id
    }

    /// Looks a session up and counts it as activity.
    pub async fn get(&self, session_id: &str) -> Option<(FrameContext, Arc<OutboxChannel>)> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(session_id).map(|s| {
            s.last_active = Instant::now();
            (s.context.clone(), s.channel.clone())
        })
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Iframe load event: mount the channel and run the bounded delivery of
    /// the invitation payload in the background. Returns false for an
    /// unknown session.
    pub async fn start_delivery(&self, session_id: &str, bus: MessageBus) -> bool {
        let Some((context, channel)) = self.get(session_id).await else {
            return false;
        };
        channel.mark_mounted(true);

        self.abort_delivery(session_id).await;

        let id = session_id.to_string();
        let handle = tokio::spawn(async move {
            let report = bus.on_frame_load(&context, channel.as_ref()).await;
            tracing::debug!(
                "Delivery for frame session {} finished: {} sent, {} failed",
                id,
                report.sent,
                report.failed
            );
        });

        let mut active = self.active_deliveries.lock().await;
        active.insert(session_id.to_string(), handle);
        true
    }

    pub async fn drain(&self, session_id: &str) -> Option<Vec<QueuedMessage>> {
        let (_, channel) = self.get(session_id).await?;
        Some(channel.drain())
    }

    /// Manual retry after a template load failure. Returns the attempt
    /// number and the URL to load again.
    pub async fn register_reload(&self, session_id: &str) -> Result<(u32, String), ReloadError> {
        let (attempt, url, channel) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.get_mut(session_id).ok_or(ReloadError::NotFound)?;
            if session.reloads >= self.max_reloads {
                tracing::error!(
                    "Frame session {} exhausted {} template reload attempts",
                    session_id,
                    self.max_reloads
                );
                return Err(ReloadError::LimitReached(self.max_reloads));
            }
            session.reloads += 1;
            session.last_active = Instant::now();
            (session.reloads, session.invitation_url.clone(), session.channel.clone())
        };

        self.abort_delivery(session_id).await;
        // The frame is navigating again; nothing can be delivered until it loads.
        channel.mark_mounted(false);
        channel.clear();

        tracing::info!(
            "Reloading template for frame session {} (attempt {}/{})",
            session_id,
            attempt,
            self.max_reloads
        );
        Ok((attempt, url))
    }

    pub async fn close(&self, session_id: &str) -> bool {
        let session = self.sessions.lock().await.remove(session_id);
        self.abort_delivery(session_id).await;

        match session {
            Some(session) => {
                session.channel.detach();
                tracing::info!("Closed frame session {}", session_id);
                true
            }
            None => false,
        }
    }

    /// Evicts sessions whose tab went away without unmounting.
    pub async fn sweep_idle(&self, idle: Duration) -> usize {
        let expired: Vec<(String, Arc<OutboxChannel>)> = {
            let mut sessions = self.sessions.lock().await;
            let mut expired = Vec::new();
            sessions.retain(|id, session| {
                let keep = session.last_active.elapsed() < idle;
                if !keep {
                    expired.push((id.clone(), session.channel.clone()));
                }
                keep
            });
            expired
        };

        for (id, channel) in &expired {
            self.abort_delivery(id).await;
            channel.detach();
            tracing::info!("Evicted idle frame session {}", id);
        }
        expired.len()
    }

    /// Runs `sweep_idle` every `every` until the returned task is aborted.
    pub fn spawn_sweeper(&self, idle: Duration, every: Duration) -> JoinHandle<()> {
        let sessions = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = sessions.sweep_idle(idle).await;
                if evicted > 0 {
                    tracing::debug!("Idle sweep evicted {} frame session(s)", evicted);
                }
            }
        })
    }

    /// Detaches every session. Used on shutdown.
    pub async fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        let mut closed = 0;
        for id in ids {
            if self.close(&id).await {
                closed += 1;
            }
        }
        closed
    }

    async fn abort_delivery(&self, session_id: &str) {
        let handle = self.active_deliveries.lock().await.remove(session_id);
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
