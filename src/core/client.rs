//! Client actor: one task reading from the peer, one task writing to it
//!
//! The reader decodes envelopes and turns them into hub commands. The writer
//! drains the outbound queue the hub fills and keeps the peer alive with
//! pings. The two only meet through the hub and the outbound queue.

use std::fmt;
use std::time::Duration;

use futures_util::sink::{Sink, SinkExt};
use futures_util::stream::{Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use uuid::Uuid;
use warp::ws::Message;

use crate::constants::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PONG_WAIT_SECS, DEFAULT_WRITE_WAIT_SECS};
use crate::core::envelope::{Envelope, EnvelopeKind, Frame};
use crate::core::hub::HubHandle;
use crate::error::{ChatHubError, Result};

pub type ClientId = Uuid;

/// Authenticated identity bound to a connection at admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub tenant_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// An admitted client: its id, identity and the receiving end of its
/// outbound queue. Produced by [`HubHandle::register`].
pub struct ClientSession {
    pub id: ClientId,
    pub identity: Identity,
    pub outbound: mpsc::Receiver<Frame>,
}

impl ClientSession {
    pub(crate) fn new(identity: Identity, outbound: mpsc::Receiver<Frame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            outbound,
        }
    }
}

/// Per-connection timing and size limits
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long the peer may stay silent before it is presumed dead
    pub pong_wait: Duration,
    /// Interval between keepalive pings, shorter than `pong_wait`
    pub ping_period: Duration,
    /// Deadline for a single write (batch, ping or close)
    pub write_wait: Duration,
    pub max_message_size: usize,
}

impl ClientConfig {
    /// Build a config whose ping period is 9/10 of the idle timeout
    pub fn new(pong_wait: Duration, write_wait: Duration, max_message_size: usize) -> Self {
        Self {
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            write_wait,
            max_message_size,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_PONG_WAIT_SECS),
            Duration::from_secs(DEFAULT_WRITE_WAIT_SECS),
            DEFAULT_MAX_MESSAGE_SIZE,
        )
    }
}

/// Why a client's read loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    PeerClosed,
    IdleTimeout,
    ReadError(String),
    FrameTooLarge(usize),
    WriterStopped,
    HubClosed,
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::IdleTimeout => write!(f, "no traffic within the idle timeout"),
            Self::ReadError(msg) => write!(f, "read error: {}", msg),
            Self::FrameTooLarge(size) => write!(f, "frame of {} bytes exceeds the limit", size),
            Self::WriterStopped => write!(f, "outbound writer stopped"),
            Self::HubClosed => write!(f, "hub is shut down"),
        }
    }
}

/// A connection admitted by the hub, ready to be driven
pub struct Client {
    session: ClientSession,
    hub: HubHandle,
    config: ClientConfig,
}

impl Client {
    pub fn new(session: ClientSession, hub: HubHandle, config: ClientConfig) -> Self {
        Self {
            session,
            hub,
            config,
        }
    }

    pub fn id(&self) -> ClientId {
        self.session.id
    }

    /// Drive the connection until it ends.
    ///
    /// The writer runs on its own task. Whatever stops the reader, the client
    /// is unregistered exactly once here, which closes the outbound queue and
    /// lets the writer close the sink.
    pub async fn run<K, S, E>(self, sink: K, mut stream: S) -> Disconnect
    where
        K: Sink<Message> + Unpin + Send + 'static,
        K::Error: fmt::Display + Send,
        S: Stream<Item = std::result::Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let Client {
            session,
            hub,
            config,
        } = self;
        let ClientSession {
            id,
            identity,
            outbound,
        } = session;

        let mut writer = tokio::spawn(write_loop(id, outbound, sink, config.clone()));
        let mut writer_done = false;

        let reason = read_loop(
            id,
            &identity,
            &hub,
            &config,
            &mut stream,
            &mut writer,
            &mut writer_done,
        )
        .await;

        info!("Client {} disconnected: {}", id, reason);

        if let Err(e) = hub.unregister(id).await {
            debug!("Unregister of client {} skipped: {}", id, e);
        }

        if !writer_done {
            if let Err(e) = writer.await {
                error!("Writer task for client {} failed: {}", id, e);
            }
        }

        reason
    }
}

async fn read_loop<S, E>(
    id: ClientId,
    identity: &Identity,
    hub: &HubHandle,
    config: &ClientConfig,
    stream: &mut S,
    writer: &mut JoinHandle<()>,
    writer_done: &mut bool,
) -> Disconnect
where
    S: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        // Every frame, pongs included, restarts the idle deadline
        let next = tokio::select! {
            biased;

            _ = &mut *writer => {
                *writer_done = true;
                return Disconnect::WriterStopped;
            }
            next = timeout(config.pong_wait, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return Disconnect::IdleTimeout,
            Ok(None) => return Disconnect::PeerClosed,
            Ok(Some(Err(e))) => return Disconnect::ReadError(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        if message.is_close() {
            return Disconnect::PeerClosed;
        }

        let size = message.as_bytes().len();
        if size > config.max_message_size {
            warn!("Client {} sent an oversized frame ({} bytes)", id, size);
            return Disconnect::FrameTooLarge(size);
        }

        if message.is_ping() || message.is_pong() {
            trace!("Keepalive from client {}", id);
            continue;
        }

        let mut envelope = match Envelope::decode(message.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed frame from client {}: {}", id, e);
                continue;
            }
        };
        envelope.stamp(identity);

        match dispatch(id, hub, envelope).await {
            Ok(()) => {}
            Err(ChatHubError::HubClosed) => return Disconnect::HubClosed,
            Err(e) => warn!("Dropping frame from client {}: {}", id, e),
        }
    }
}

/// Turn a decoded envelope into the matching hub command
async fn dispatch(id: ClientId, hub: &HubHandle, envelope: Envelope) -> Result<()> {
    match envelope.kind {
        EnvelopeKind::JoinRoom => hub.join_room(id, envelope.room_id).await,
        EnvelopeKind::LeaveRoom => hub.leave_room(id, envelope.room_id).await,
        EnvelopeKind::ChatMessage => {
            let frame = envelope.to_frame()?;
            if envelope.is_global() {
                hub.broadcast_all(frame).await
            } else {
                hub.broadcast_to_room(envelope.room_id, frame).await
            }
        }
        EnvelopeKind::Unknown => {
            debug!("Ignoring envelope of unknown type from client {}", id);
            Ok(())
        }
    }
}

async fn write_loop<K>(
    id: ClientId,
    mut outbound: mpsc::Receiver<Frame>,
    mut sink: K,
    config: ClientConfig,
) where
    K: Sink<Message> + Unpin,
    K::Error: fmt::Display,
{
    let mut keepalive = interval_at(Instant::now() + config.ping_period, config.ping_period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    debug!("Outbound queue for client {} closed", id);
                    break;
                };

                match timeout(config.write_wait, write_batch(&mut sink, frame, &mut outbound)).await {
                    Ok(Ok(count)) => trace!("Wrote {} frames to client {}", count, id),
                    Ok(Err(e)) => {
                        warn!("Write to client {} failed: {}", id, e);
                        break;
                    }
                    Err(_) => {
                        warn!("Write to client {} timed out", id);
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                match timeout(config.write_wait, sink.send(Message::ping(Vec::new()))).await {
                    Ok(Ok(())) => trace!("Ping sent to client {}", id),
                    Ok(Err(e)) => {
                        warn!("Ping to client {} failed: {}", id, e);
                        break;
                    }
                    Err(_) => {
                        warn!("Ping to client {} timed out", id);
                        break;
                    }
                }
            }
        }
    }

    if timeout(config.write_wait, sink.close()).await.is_err() {
        debug!("Closing connection of client {} timed out", id);
    }
}

/// Write `first` plus whatever was already queued when it arrived, then
/// flush once. Returns the number of frames written.
async fn write_batch<K>(
    sink: &mut K,
    first: Frame,
    outbound: &mut mpsc::Receiver<Frame>,
) -> std::result::Result<usize, K::Error>
where
    K: Sink<Message> + Unpin,
{
    let pending = outbound.len();

    sink.feed(Message::text(first.as_ref())).await?;
    let mut written = 1;

    for _ in 0..pending {
        match outbound.try_recv() {
            Ok(frame) => {
                sink.feed(Message::text(frame.as_ref())).await?;
                written += 1;
            }
            Err(_) => break,
        }
    }

    sink.flush().await?;
    Ok(written)
}
