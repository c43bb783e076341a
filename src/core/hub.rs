//! Hub coordinator
//!
//! A single task owns the registry of connected clients and the room index.
//! Everything else talks to it through [`HubHandle`], which only enqueues
//! commands, so the state itself never needs a lock.
//!
//! Two intakes feed the task:
//! - the admission intake, bounded; a full intake rejects the new connection
//! - the command intake, shared by every client in FIFO order
//!
//! The admission intake is polled first, so a registration is always
//! observed before any command sent after it.

use std::collections::{HashMap, HashSet};

use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::constants::{
    DEFAULT_COMMAND_QUEUE_CAPACITY, DEFAULT_REGISTER_QUEUE_CAPACITY, DEFAULT_SEND_QUEUE_CAPACITY,
};
use crate::core::client::{ClientId, ClientSession, Identity};
use crate::core::envelope::Frame;
use crate::core::room::RoomIndex;
use crate::error::{ChatHubError, Result};

/// Capacities of the hub's queues
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub register_queue_capacity: usize,
    pub command_queue_capacity: usize,
    /// Outbound frames buffered per client before it is evicted
    pub send_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            register_queue_capacity: DEFAULT_REGISTER_QUEUE_CAPACITY,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

struct Registration {
    id: ClientId,
    identity: Identity,
    sender: mpsc::Sender<Frame>,
}

enum Command {
    Unregister(ClientId),
    JoinRoom { client_id: ClientId, room_id: String },
    LeaveRoom { client_id: ClientId, room_id: String },
    BroadcastToRoom { room_id: String, frame: Frame },
    BroadcastAll { frame: Frame },
    RoomSize { room_id: String, reply: oneshot::Sender<usize> },
    ClientCount { reply: oneshot::Sender<usize> },
    ClientRooms { client_id: ClientId, reply: oneshot::Sender<Option<Vec<String>>> },
    Shutdown { done: oneshot::Sender<()> },
}

/// Hub-side state of one registered client
struct ClientSlot {
    identity: Identity,
    /// The only sender of the client's outbound queue; dropping it closes the queue
    sender: mpsc::Sender<Frame>,
    rooms: HashSet<String>,
}

/// Owner of the client registry and room index
pub struct Hub {
    clients: HashMap<ClientId, ClientSlot>,
    rooms: RoomIndex,
    register_rx: mpsc::Receiver<Registration>,
    command_rx: mpsc::Receiver<Command>,
}

impl Hub {
    /// Create a hub and the handle used to reach it
    pub fn new(config: &HubConfig) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(config.register_queue_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity.max(1));

        let hub = Self {
            clients: HashMap::new(),
            rooms: RoomIndex::new(),
            register_rx,
            command_rx,
        };
        let handle = HubHandle {
            register_tx,
            command_tx,
            send_queue_capacity: config.send_queue_capacity.max(1),
        };

        (hub, handle)
    }

    /// Create a hub and run it on its own task
    pub fn spawn(config: &HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Hub coordinator started");

        loop {
            tokio::select! {
                biased;

                Some(registration) = self.register_rx.recv() => {
                    self.register(registration);
                }
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if !self.handle(command) {
                            break;
                        }
                    }
                    None => {
                        debug!("All hub handles dropped");
                        self.shutdown();
                        break;
                    }
                },
            }
        }

        info!("Hub coordinator stopped");
    }

    /// Apply one command. Returns false once the hub has shut down.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Unregister(client_id) => {
                self.unregister(&client_id);
            }
            Command::JoinRoom { client_id, room_id } => self.join_room(client_id, room_id),
            Command::LeaveRoom { client_id, room_id } => self.leave_room(&client_id, &room_id),
            Command::BroadcastToRoom { room_id, frame } => {
                let delivered = self.broadcast_to_room(&room_id, &frame);
                trace!("Broadcast to room {} reached {} clients", room_id, delivered);
            }
            Command::BroadcastAll { frame } => {
                let delivered = self.broadcast_all(&frame);
                trace!("Global broadcast reached {} clients", delivered);
            }
            Command::RoomSize { room_id, reply } => {
                let _ = reply.send(self.rooms.size(&room_id));
            }
            Command::ClientCount { reply } => {
                let _ = reply.send(self.clients.len());
            }
            Command::ClientRooms { client_id, reply } => {
                let rooms = self
                    .clients
                    .get(&client_id)
                    .map(|slot| slot.rooms.iter().cloned().collect());
                let _ = reply.send(rooms);
            }
            Command::Shutdown { done } => {
                self.shutdown();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    fn register(&mut self, registration: Registration) {
        let Registration { id, identity, sender } = registration;
        info!(
            "Client {} admitted (user={}, tenant={})",
            id, identity.user_id, identity.tenant_id
        );
        self.clients.insert(
            id,
            ClientSlot {
                identity,
                sender,
                rooms: HashSet::new(),
            },
        );
        debug!("Current connections: {}", self.clients.len());
    }

    /// Remove a client from the registry and from every room it joined.
    /// Dropping its slot closes the outbound queue. Returns false if the
    /// client was already gone.
    fn unregister(&mut self, client_id: &ClientId) -> bool {
        let Some(slot) = self.clients.remove(client_id) else {
            return false;
        };

        for room_id in &slot.rooms {
            self.rooms.remove(room_id, client_id);
        }

        info!(
            "Client {} unregistered (user={}, rooms={})",
            client_id,
            slot.identity.user_id,
            slot.rooms.len()
        );
        debug!("Current connections: {}", self.clients.len());
        true
    }

    fn join_room(&mut self, client_id: ClientId, room_id: String) {
        if room_id.is_empty() {
            debug!("Client {} sent join without a room id", client_id);
            return;
        }
        let Some(slot) = self.clients.get_mut(&client_id) else {
            debug!("Join from unknown client {}", client_id);
            return;
        };

        self.rooms.insert(&room_id, client_id);
        if slot.rooms.insert(room_id.clone()) {
            debug!("Client {} joined room {}", client_id, room_id);
        }
    }

    fn leave_room(&mut self, client_id: &ClientId, room_id: &str) {
        let Some(slot) = self.clients.get_mut(client_id) else {
            return;
        };

        if slot.rooms.remove(room_id) {
            self.rooms.remove(room_id, client_id);
            debug!("Client {} left room {}", client_id, room_id);
        }
    }

    /// Enqueue a frame for every member of a room. Members whose queue
    /// is full or closed are evicted. Returns the number of deliveries.
    fn broadcast_to_room(&mut self, room_id: &str, frame: &Frame) -> usize {
        let recipients: Vec<ClientId> = self.rooms.members(room_id).copied().collect();
        self.deliver(recipients, frame)
    }

    fn broadcast_all(&mut self, frame: &Frame) -> usize {
        let recipients: Vec<ClientId> = self.clients.keys().copied().collect();
        self.deliver(recipients, frame)
    }

    fn deliver(&mut self, recipients: Vec<ClientId>, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut evicted = Vec::new();

        for client_id in recipients {
            let Some(slot) = self.clients.get(&client_id) else {
                continue;
            };

            match slot.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Outbound queue full for client {}, evicting", client_id);
                    evicted.push(client_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Outbound queue closed for client {}, evicting", client_id);
                    evicted.push(client_id);
                }
            }
        }

        for client_id in evicted {
            self.unregister(&client_id);
        }

        delivered
    }

    fn shutdown(&mut self) {
        self.register_rx.close();
        self.command_rx.close();

        let count = self.clients.len();
        self.clients.clear();
        self.rooms = RoomIndex::new();

        info!("Hub shut down, closed {} client queues", count);
    }
}

/// Cloneable handle to a running hub
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    command_tx: mpsc::Sender<Command>,
    send_queue_capacity: usize,
}

impl HubHandle {
    /// Admit a new client with a pre-authenticated identity.
    ///
    /// Never waits: a saturated admission intake yields
    /// [`ChatHubError::AdmissionRejected`] and the caller must close the
    /// connection.
    pub fn register(&self, identity: Identity) -> Result<ClientSession> {
        let (sender, outbound) = mpsc::channel(self.send_queue_capacity);
        let session = ClientSession::new(identity.clone(), outbound);

        let registration = Registration {
            id: session.id,
            identity,
            sender,
        };

        match self.register_tx.try_send(registration) {
            Ok(()) => Ok(session),
            Err(mpsc::error::TrySendError::Full(_)) => Err(ChatHubError::AdmissionRejected),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ChatHubError::HubClosed),
        }
    }

    /// Remove a client and close its outbound queue. Safe to repeat.
    pub async fn unregister(&self, client_id: ClientId) -> Result<()> {
        self.send(Command::Unregister(client_id)).await
    }

    pub async fn join_room(&self, client_id: ClientId, room_id: impl Into<String>) -> Result<()> {
        self.send(Command::JoinRoom {
            client_id,
            room_id: room_id.into(),
        })
        .await
    }

    pub async fn leave_room(&self, client_id: ClientId, room_id: impl Into<String>) -> Result<()> {
        self.send(Command::LeaveRoom {
            client_id,
            room_id: room_id.into(),
        })
        .await
    }

    /// Fan a serialized frame out to every member of a room
    pub async fn broadcast_to_room(
        &self,
        room_id: impl Into<String>,
        frame: impl Into<Frame>,
    ) -> Result<()> {
        self.send(Command::BroadcastToRoom {
            room_id: room_id.into(),
            frame: frame.into(),
        })
        .await
    }

    /// Fan a serialized frame out to every registered client
    pub async fn broadcast_all(&self, frame: impl Into<Frame>) -> Result<()> {
        self.send(Command::BroadcastAll {
            frame: frame.into(),
        })
        .await
    }

    /// Current member count of a room, 0 if it does not exist
    pub async fn room_size(&self, room_id: impl Into<String>) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RoomSize {
            room_id: room_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ChatHubError::HubClosed)
    }

    pub async fn client_count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClientCount { reply }).await?;
        rx.await.map_err(|_| ChatHubError::HubClosed)
    }

    /// Rooms a client has joined, or `None` if it is not registered
    pub async fn client_rooms(&self, client_id: ClientId) -> Result<Option<Vec<String>>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClientRooms { client_id, reply }).await?;
        rx.await.map_err(|_| ChatHubError::HubClosed)
    }

    /// Stop accepting commands and close every client's outbound queue
    pub async fn shutdown(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.send(Command::Shutdown { done }).await?;
        rx.await.map_err(|_| ChatHubError::HubClosed)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ChatHubError::HubClosed)
    }
}
