//! Session manager: applies each connection's commands to the room table.
//!
//! One manager is shared by every connection. A connection's reader feeds
//! it frames strictly in arrival order; the manager decides what to reply,
//! what to broadcast, and keeps the registry's joined-room index in step
//! with the room table.

use std::sync::Arc;

use roomrelay_protocol::{
    Codec, Command, Outbound, ProtocolVersion, RoomId, TextCodec, UserRef,
};
use roomrelay_session::{ConnectionRegistry, Member, OutboundQueue, SessionError};
use roomrelay_transport::ConnectionId;

use crate::commands::{interpret, Intent, RoomCommand};
use crate::items::Reaction;
use crate::{Dispatcher, RoomDescription, RoomError, RoomTable};

/// Where the answer to a `room` command goes.
enum Reply {
    Sender(Outbound),
    Room(Outbound),
    Silent,
}

/// Drives the per-connection state machine for all connections.
///
/// ```text
///   Unidentified ──roomHello──→ Identified ──roomJoin/roomPart/room──┐
///        ↑                          │  ↑                             │
///        └────────roomGoodbye───────┘  └─────────────────────────────┘
/// ```
pub struct SessionManager<C: Codec = TextCodec> {
    registry: Arc<ConnectionRegistry>,
    table: Arc<RoomTable>,
    dispatcher: Dispatcher,
    codec: C,
    description: RoomDescription,
}

impl SessionManager<TextCodec> {
    /// A manager speaking the `verb,roomId,json` text protocol.
    pub fn with_text_codec(
        registry: Arc<ConnectionRegistry>,
        table: Arc<RoomTable>,
        description: RoomDescription,
    ) -> Self {
        Self::new(registry, table, TextCodec, description)
    }
}

impl<C: Codec> SessionManager<C> {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        table: Arc<RoomTable>,
        codec: C,
        description: RoomDescription,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        Self {
            registry,
            table,
            dispatcher,
            codec,
            description,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &Arc<RoomTable> {
        &self.table
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // -- connection lifecycle ---------------------------------------------

    /// Registers a new connection and queues the `ack` greeting.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`] if the id is in use.
    pub async fn connection_opened(
        &self,
        conn_id: ConnectionId,
    ) -> Result<OutboundQueue, SessionError> {
        let queue = self.registry.register(conn_id).await?;
        self.send(conn_id, &Outbound::ack()).await;
        Ok(queue)
    }

    /// Runs when the transport closes, in any state: leaves every joined
    /// room with the usual notifications, then drops the registry entry.
    pub async fn connection_closed(&self, conn_id: ConnectionId) {
        for room_id in self.registry.joined_rooms(conn_id).await {
            self.leave(conn_id, &room_id).await;
        }
        self.registry.forget_identity(conn_id).await;

        match self.registry.unregister(conn_id).await {
            Some(leftover) if !leftover.is_empty() => {
                tracing::warn!(%conn_id, rooms = ?leftover, "memberships left behind at close");
            }
            _ => {}
        }
    }

    // -- inbound ----------------------------------------------------------

    /// Decodes and applies one inbound frame.
    ///
    /// Rejections are answered with an `error` frame to the sender before
    /// being returned; the caller only needs to log them.
    pub async fn handle_frame(
        &self,
        conn_id: ConnectionId,
        frame: &str,
    ) -> Result<(), RoomError> {
        let command = match self.codec.decode(frame) {
            Ok(command) => command,
            Err(e) => {
                let err = RoomError::from(e);
                self.reject(conn_id, None, &err).await;
                return Err(err);
            }
        };
        self.handle_command(conn_id, command).await
    }

    /// Applies an already decoded command.
    pub async fn handle_command(
        &self,
        conn_id: ConnectionId,
        command: Command,
    ) -> Result<(), RoomError> {
        let room_id = command.room_id().clone();
        tracing::debug!(%conn_id, %room_id, verb = command.verb().as_str(), "command");

        let result = self.apply(conn_id, command).await;
        if let Err(e) = &result {
            self.reject(conn_id, Some(&room_id), e).await;
        }
        result
    }

    async fn apply(&self, conn_id: ConnectionId, command: Command) -> Result<(), RoomError> {
        let identity = self.registry.member(conn_id).await;

        match (command, identity) {
            (Command::Hello { room_id, user, version }, _) => {
                self.hello(conn_id, &room_id, user, version).await;
                Ok(())
            }
            (command, None) => Err(RoomError::NotHelloed {
                verb: command.verb().as_str(),
            }),
            (Command::Join { room_id, user, version }, Some(_)) => {
                self.join(conn_id, &room_id, user, version).await;
                Ok(())
            }
            (Command::Part { room_id, .. }, Some(_)) => {
                if !self.leave(conn_id, &room_id).await {
                    tracing::debug!(%conn_id, %room_id, "part ignored, not a member");
                }
                Ok(())
            }
            (Command::Goodbye { .. }, Some(identity)) => {
                self.goodbye(conn_id, &identity).await;
                Ok(())
            }
            (Command::Message { room_id, user, content }, Some(_)) => {
                self.message(conn_id, &room_id, &user, &content).await
            }
        }
    }

    async fn hello(
        &self,
        conn_id: ConnectionId,
        room_id: &RoomId,
        user: UserRef,
        version: ProtocolVersion,
    ) {
        let member = Member::new(conn_id, user, version);
        let user_id = member.user_id().to_owned();
        if let Err(e) = self.registry.identify(member).await {
            tracing::debug!(%conn_id, error = %e, "hello from unregistered connection");
            return;
        }
        tracing::info!(%conn_id, %user_id, version = version.as_u64(), "connection identified");

        self.send(conn_id, &Outbound::location(&user_id, self.description.location(room_id)))
            .await;
        self.send(conn_id, &Outbound::user_event(&user_id, "Welcome!"))
            .await;
    }

    async fn join(
        &self,
        conn_id: ConnectionId,
        room_id: &RoomId,
        user: UserRef,
        version: ProtocolVersion,
    ) {
        let member = Member::new(conn_id, user, version);
        let user_id = member.user_id().to_owned();
        let username = member.username().to_owned();

        let mut guard = self.table.lock_for_join(room_id).await;
        let newly_joined = guard.insert(member).is_none();
        self.registry.record_join(conn_id, room_id).await;

        self.send(conn_id, &Outbound::location(&user_id, self.description.location(room_id)))
            .await;

        if newly_joined {
            tracing::info!(%conn_id, %room_id, members = guard.len(), "joined room");
            if let Some(frame) = self.encode(&Outbound::room_event(format!("{username} is here"))) {
                self.dispatcher
                    .broadcast_locked(&guard, &frame, Some(conn_id))
                    .await;
            }
        }
        self.table.release(guard).await;
    }

    /// Removes the connection from one room and tells the remaining
    /// members. Returns `false` if it was not a member.
    async fn leave(&self, conn_id: ConnectionId, room_id: &RoomId) -> bool {
        let Some(mut guard) = self.table.lock_existing(room_id).await else {
            self.registry.record_part(conn_id, room_id).await;
            return false;
        };

        let removed = guard.remove(conn_id);
        if let Some(member) = &removed {
            self.registry.record_part(conn_id, room_id).await;
            tracing::info!(%conn_id, %room_id, members = guard.len(), "left room");
            let gone = Outbound::room_event(format!("{} has gone", member.username()));
            if let Some(frame) = self.encode(&gone) {
                self.dispatcher.broadcast_locked(&guard, &frame, None).await;
            }
        }
        self.table.release(guard).await;
        removed.is_some()
    }

    async fn goodbye(&self, conn_id: ConnectionId, identity: &Member) {
        for room_id in self.registry.joined_rooms(conn_id).await {
            self.leave(conn_id, &room_id).await;
        }
        self.send(conn_id, &Outbound::user_event(identity.user_id(), "Bye!"))
            .await;
        self.registry.forget_identity(conn_id).await;
        tracing::info!(%conn_id, user_id = identity.user_id(), "connection said goodbye");
    }

    async fn message(
        &self,
        conn_id: ConnectionId,
        room_id: &RoomId,
        user: &UserRef,
        content: &str,
    ) -> Result<(), RoomError> {
        let Some(guard) = self.table.lock_existing(room_id).await else {
            return Err(RoomError::NotInRoom(room_id.clone()));
        };
        if !guard.contains(conn_id) {
            self.table.release(guard).await;
            return Err(RoomError::NotInRoom(room_id.clone()));
        }

        let reply = match interpret(content) {
            Intent::Chat(text) => Reply::Room(Outbound::chat(&user.username, text)),
            Intent::Command(command) => self.answer(room_id, user, command),
        };
        match reply {
            Reply::Room(msg) => {
                if let Some(frame) = self.encode(&msg) {
                    self.dispatcher.broadcast_locked(&guard, &frame, None).await;
                }
                self.table.release(guard).await;
            }
            Reply::Sender(msg) => {
                self.table.release(guard).await;
                self.send(conn_id, &msg).await;
            }
            Reply::Silent => self.table.release(guard).await,
        }
        Ok(())
    }

    fn answer(&self, room_id: &RoomId, user: &UserRef, command: RoomCommand<'_>) -> Reply {
        let user_id = user.user_id.as_str();
        match command {
            RoomCommand::Look => {
                Reply::Sender(Outbound::location(user_id, self.description.location(room_id)))
            }
            RoomCommand::Examine(item) if self.description.stocks(item) => {
                self.react(user_id, item.look(&user.username))
            }
            RoomCommand::Examine(_) | RoomCommand::LookAt(_) => {
                Reply::Sender(Outbound::user_event(user_id, "It doesn't look interesting"))
            }
            RoomCommand::Go(direction) => Reply::Sender(Outbound::exit(
                user_id,
                direction.exit_id(),
                format!("You head {direction}"),
            )),
            RoomCommand::GoNowhere(Some(word)) => Reply::Sender(Outbound::user_event(
                user_id,
                format!("There isn't a door in that direction ({word})"),
            )),
            RoomCommand::GoNowhere(None) => Reply::Sender(Outbound::user_event(
                user_id,
                "You didn't say which way you wanted to go.",
            )),
            RoomCommand::Use(item) if self.description.stocks(item) => {
                self.react(user_id, item.used_by(&user.username))
            }
            RoomCommand::Use(_) | RoomCommand::UseNothing(_) => Reply::Sender(
                Outbound::user_event(user_id, "You have no idea how to use that"),
            ),
            RoomCommand::About => Reply::Silent,
            RoomCommand::Unknown(text) => Reply::Sender(Outbound::user_event(
                user_id,
                format!("This room is a basic model. It doesn't understand `{text}`"),
            )),
        }
    }

    fn react(&self, user_id: &str, reaction: Reaction) -> Reply {
        match reaction {
            Reaction::Seen { everyone, actor } => {
                Reply::Room(Outbound::event(everyone, actor.map(|text| (user_id, text))))
            }
            Reaction::Exit { direction, text } => {
                Reply::Sender(Outbound::exit(user_id, direction.exit_id(), text))
            }
        }
    }

    // -- outbound ---------------------------------------------------------

    async fn reject(&self, conn_id: ConnectionId, room_id: Option<&RoomId>, err: &RoomError) {
        tracing::debug!(%conn_id, error = %err, "command rejected");
        self.send(conn_id, &Outbound::error(room_id, err.code(), err.to_string()))
            .await;
    }

    fn encode(&self, msg: &Outbound) -> Option<String> {
        match self.codec.encode(msg) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode outbound frame");
                None
            }
        }
    }

    async fn send(&self, conn_id: ConnectionId, msg: &Outbound) {
        let Some(frame) = self.encode(msg) else {
            return;
        };
        if let Err(e) = self.registry.send(conn_id, frame).await {
            tracing::debug!(%conn_id, error = %e, "reply dropped");
        }
    }
}
