//! Event dispatch: decode a typed [`Event`] into positional [`Value`]s and
//! invoke the matching handler slot.
//!
//! Dispatch is fail-soft. An event whose entities no longer resolve is
//! dropped, a slot holding a non-callable drops its events before anything
//! is decoded, and handler errors or panics are recorded as
//! [`HandlerFailure`]s instead of propagating into the toolkit.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error, info, warn};

use crate::callbacks::{Callbacks, EventSlot};
use crate::client::Session;
use crate::entity::Channel;
use crate::event::{
    Actor, Event, JoinContext, Notification, PassphraseCompletion, PendingLookup, Reply,
};
use crate::native::{ChannelEntry, ClientEntry, ConnectionEntry, EntryRef, MemberList};
use crate::types::{Command, ConnectionStatus, MessageFlags, Status};
use crate::value::Value;

/// A handler that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// The slot whose handler failed.
    pub slot: EventSlot,
    /// Error text or panic message.
    pub message: String,
}

/// Bounded queue of handler failures. The oldest entry is dropped when full.
#[derive(Debug)]
pub(crate) struct FailureQueue {
    entries: VecDeque<HandlerFailure>,
}

impl FailureQueue {
    const CAPACITY: usize = 64;

    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(Self::CAPACITY),
        }
    }

    fn push(&mut self, failure: HandlerFailure) {
        if self.entries.len() == Self::CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(failure);
    }

    pub(crate) fn drain(&mut self) -> Vec<HandlerFailure> {
        self.entries.drain(..).collect()
    }
}

/// Borrowed client state for the duration of one event.
pub(crate) struct Dispatch<'a> {
    pub(crate) session: &'a mut Session,
    pub(crate) callbacks: &'a mut Callbacks,
    pub(crate) failures: &'a mut FailureQueue,
}

impl Dispatch<'_> {
    pub(crate) fn event(&mut self, event: Event) {
        match event {
            Event::Say { kind, message } => {
                debug!(?kind, "toolkit message");
                self.invoke(EventSlot::Say, vec![message.into()]);
            }
            Event::ChannelMessage {
                sender,
                channel,
                flags,
                payload,
            } => self.channel_message(&sender, &channel, flags, payload),
            Event::PrivateMessage {
                sender,
                flags,
                payload,
            } => self.private_message(&sender, flags, payload),
            Event::Notify(notification) => self.notify(notification),
            Event::Command {
                success,
                command,
                status,
            } => self.invoke(
                EventSlot::Command,
                vec![
                    success.into(),
                    command.code().into(),
                    command.name().into(),
                    status.message().into(),
                ],
            ),
            Event::CommandReply {
                command,
                status,
                error,
                reply,
            } => self.command_reply(command, status, error, reply),
            Event::Connection {
                status,
                error,
                message,
                connection,
            } => self.connection(status, error, message, connection),
            Event::Detach { data } => self.invoke(EventSlot::Detach, vec![data.into()]),
            Event::PassphraseRequested { completion } => self.passphrase(completion),
            Event::ClientsResolved { clients, lookup } => self.join_finished(&clients, lookup),
        }
    }

    fn connection(
        &mut self,
        status: ConnectionStatus,
        error: Status,
        message: Option<String>,
        connection: Option<EntryRef<ConnectionEntry>>,
    ) {
        if status.is_success() {
            match connection {
                Some(conn) if error == Status::OK && conn.is_live() => {
                    info!(?status, "connected");
                    self.session.set_connection(conn);
                    self.invoke(EventSlot::Connected, Vec::new());
                    return;
                }
                _ => {
                    warn!(?status, %error, "connect reported success without a usable connection");
                    self.session.clear_connection();
                }
            }
        } else if status == ConnectionStatus::Disconnected {
            info!(reason = message.as_deref().unwrap_or(""), "disconnected");
            self.session.clear_connection();
            self.invoke(
                EventSlot::Disconnected,
                vec![message.unwrap_or_default().into()],
            );
            return;
        } else {
            warn!(?status, %error, "connection failed");
        }

        self.invoke(
            EventSlot::Failure,
            vec![
                status.code().into(),
                error.0.into(),
                error.message().into(),
                message.into(),
            ],
        );
    }

    /// Answer a passphrase request from the `ask_passphrase` slot. Anything
    /// but text or bytes answers with an empty passphrase.
    fn passphrase(&mut self, completion: PassphraseCompletion) {
        let passphrase = match self.answer(EventSlot::AskPassphrase, Vec::new()) {
            Some(Value::Str(text)) => text.into_bytes(),
            Some(Value::Bytes(bytes)) => bytes,
            Some(other) => {
                debug!(answer = ?other, "passphrase handler gave no text");
                Vec::new()
            }
            None => Vec::new(),
        };
        completion.complete(&passphrase);
    }

    fn channel_message(
        &mut self,
        sender: &EntryRef<ClientEntry>,
        channel: &EntryRef<ChannelEntry>,
        flags: MessageFlags,
        payload: Vec<u8>,
    ) {
        let slot = EventSlot::ChannelMessage;
        if !self.callbacks.is_callable(slot) {
            return;
        }
        let args = (|| {
            Some(vec![
                self.user(sender)?,
                self.channel(channel)?,
                flags.bits().into(),
                String::from_utf8(payload).ok()?.into(),
            ])
        })();
        self.deliver(slot, args);
    }

    fn private_message(
        &mut self,
        sender: &EntryRef<ClientEntry>,
        flags: MessageFlags,
        payload: Vec<u8>,
    ) {
        let slot = EventSlot::PrivateMessage;
        if !self.callbacks.is_callable(slot) {
            return;
        }
        let args = (|| {
            Some(vec![
                self.user(sender)?,
                flags.bits().into(),
                String::from_utf8(payload).ok()?.into(),
            ])
        })();
        self.deliver(slot, args);
    }

    fn notify(&mut self, notification: Notification) {
        let Some(slot) = notify_slot(&notification) else {
            debug!(kind = ?notification.kind(), "notification has no handler slot");
            return;
        };
        if !self.callbacks.is_callable(slot) {
            return;
        }
        let args = self.notify_args(notification);
        self.deliver(slot, args);
    }

    fn notify_args(&mut self, notification: Notification) -> Option<Vec<Value>> {
        let args = match notification {
            Notification::None { message } | Notification::Motd { message } => {
                vec![message.into()]
            }
            Notification::Invite {
                channel,
                channel_name,
                inviter,
            } => {
                let channel = match channel {
                    Some(channel) => self.channel(&channel)?,
                    None => Value::None,
                };
                vec![channel, channel_name.into(), self.user(&inviter)?]
            }
            Notification::Join { user, channel } | Notification::Leave { user, channel } => {
                vec![self.user(&user)?, self.channel(&channel)?]
            }
            Notification::Signoff { user, message } => {
                vec![self.user(&user)?, message.unwrap_or_default().into()]
            }
            Notification::TopicSet {
                actor,
                channel,
                topic,
            } => {
                let [tag, actor] = self.actor(&actor)?;
                vec![tag, actor, self.channel(&channel)?, topic.into()]
            }
            Notification::NickChange { old, new } => vec![self.user(&old)?, self.user(&new)?],
            Notification::CmodeChange {
                actor,
                mode,
                cipher,
                hmac,
                passphrase,
                channel,
            } => {
                let [tag, actor] = self.actor(&actor)?;
                vec![
                    tag,
                    actor,
                    mode.into(),
                    cipher.into(),
                    hmac.into(),
                    passphrase.into(),
                    Value::None,
                    Value::None,
                    self.channel(&channel)?,
                ]
            }
            Notification::CumodeChange {
                actor,
                mode,
                channel,
                target,
            } => {
                let [tag, actor] = self.actor(&actor)?;
                vec![
                    tag,
                    actor,
                    mode.into(),
                    self.channel(&channel)?,
                    self.user(&target)?,
                ]
            }
            Notification::ChannelChange { channel } => vec![self.channel(&channel)?],
            Notification::ServerSignoff => Vec::new(),
            Notification::Kicked {
                kicked,
                message,
                kicker,
                channel,
            } => vec![
                self.user(&kicked)?,
                message.into(),
                self.user(&kicker)?,
                self.channel(&channel)?,
            ],
            Notification::Killed {
                killed,
                message,
                actor,
                channel,
            } => {
                let [_, actor] = self.actor(&actor)?;
                let channel = match channel {
                    Some(channel) => self.channel(&channel)?,
                    None => Value::None,
                };
                vec![self.user(&killed)?, message.into(), actor, channel]
            }
            Notification::Error { error } => vec![error.0.into(), error.message().into()],
            Notification::Watch {
                user,
                new_nick,
                mode,
                notification,
            } => vec![
                self.user(&user)?,
                new_nick.into(),
                mode.into(),
                notification.code().into(),
                Value::None,
            ],
            Notification::Unhandled(_) => return None,
        };
        Some(args)
    }

    fn command_reply(
        &mut self,
        command: Command,
        status: Status,
        error: Status,
        reply: Option<Reply>,
    ) {
        if !status.is_ok() {
            self.invoke(
                EventSlot::CommandReplyFailed,
                vec![
                    command.code().into(),
                    command.name().into(),
                    error.0.into(),
                    error.message().into(),
                ],
            );
            return;
        }
        let Some(slot) = reply_slot(command) else {
            debug!(%command, "command reply has no handler slot");
            return;
        };
        if !self.callbacks.is_callable(slot) {
            return;
        }
        let Some(reply) = reply else {
            debug!(%command, "command reply carries no decodable payload");
            return;
        };
        if reply.command() != command {
            debug!(%command, payload = %reply.command(), "command reply payload mismatch");
            return;
        }
        if let Reply::Join {
            channel_name,
            channel,
            mode,
            topic,
            hmac,
            members,
            user_limit,
        } = reply
        {
            let context = self.channel_entry(&channel).map(|channel| JoinContext {
                channel,
                channel_name,
                topic,
                hmac,
                mode,
                user_limit,
                epoch: self.session.epoch(),
            });
            match context {
                Some(context) => self.begin_join(&members, context),
                None => debug!(%slot, "join reply for a released channel dropped"),
            }
            return;
        }
        let args = self.reply_args(reply);
        self.deliver(slot, args);
    }

    fn reply_args(&mut self, reply: Reply) -> Option<Vec<Value>> {
        let args = match reply {
            Reply::Whois {
                user,
                nickname,
                username,
                realname,
                mode,
                idle,
            } => vec![
                self.user(&user)?,
                nickname.into(),
                username.into(),
                realname.into(),
                mode.into(),
                idle.into(),
            ],
            Reply::Whowas {
                user,
                nickname,
                username,
                realname,
            } => vec![
                self.user(&user)?,
                nickname.into(),
                username.into(),
                realname.into(),
            ],
            Reply::Identify { name, info } => vec![name.into(), info.into()],
            Reply::Nick {
                user,
                nickname,
                old_id,
            } => vec![
                self.user(&user)?,
                nickname.into(),
                old_id.as_bytes().as_slice().into(),
            ],
            Reply::List(None) => vec![Value::None, Value::None, Value::None, 0i64.into()],
            Reply::List(Some(listing)) => vec![
                self.channel(&listing.channel)?,
                listing.name.into(),
                listing.topic.into(),
                listing.user_count.into(),
            ],
            Reply::Topic { channel, topic } => vec![self.channel(&channel)?, topic.into()],
            Reply::Invite { channel, invites } => vec![
                self.channel(&channel)?,
                Value::Tuple(invites.into_iter().map(Value::from).collect()),
            ],
            Reply::Kill { user } => {
                vec![user.and_then(|user| self.user(&user)).unwrap_or_default()]
            }
            Reply::Ping | Reply::Oper | Reply::Detach | Reply::Watch | Reply::Silcoper => {
                Vec::new()
            }
            Reply::Motd { motd } => vec![motd.into()],
            Reply::Cmode {
                channel,
                mode,
                user_limit,
            } => vec![
                self.channel(&channel)?,
                mode.into(),
                user_limit.into(),
                Value::None,
                Value::None,
            ],
            Reply::Cumode {
                mode,
                channel,
                user,
            } => vec![mode.into(), self.channel(&channel)?, self.user(&user)?],
            Reply::Kick { channel, user } => vec![self.channel(&channel)?, self.user(&user)?],
            Reply::Ban { channel, bans } => vec![
                self.channel(&channel)?,
                bans.map(|bans| Value::Tuple(bans.into_iter().map(Value::from).collect()))
                    .unwrap_or_default(),
            ],
            Reply::Leave { channel } => vec![self.channel(&channel)?],
            Reply::Users { channel, members } => {
                let channel = self.channel(&channel)?;
                let members = members
                    .iter()
                    .map(|member| self.user(member).unwrap_or_default())
                    .collect();
                vec![channel, Value::Tuple(members)]
            }
            Reply::Join { .. } => return None,
        };
        Some(args)
    }

    /// Hand the join context to the toolkit until the members are resolved.
    fn begin_join(&mut self, members: &MemberList, context: JoinContext) {
        let conn = match self.session.connection() {
            Ok(conn) => conn,
            Err(err) => {
                debug!(channel = %context.channel_name, %err, "join reply without a connection dropped");
                return;
            }
        };
        debug!(
            channel = %context.channel_name,
            members = members.len(),
            "resolving join members"
        );
        self.session
            .toolkit_mut()
            .resolve_clients(&conn, members, PendingLookup::new(context));
    }

    fn join_finished(&mut self, clients: &[EntryRef<ClientEntry>], lookup: PendingLookup) {
        let context = lookup.into_context();
        if context.epoch != self.session.epoch() {
            debug!(channel = %context.channel_name, "member lookup from a previous connection discarded");
            return;
        }
        let slot = EventSlot::CommandReplyJoin;
        if !self.callbacks.is_callable(slot) {
            return;
        }
        debug!(
            channel = %context.channel_name,
            mode = context.mode,
            user_limit = context.user_limit,
            members = clients.len(),
            "join members resolved"
        );
        let members = clients
            .iter()
            .map(|client| self.user(client).unwrap_or_default())
            .collect();
        self.invoke(
            slot,
            vec![
                context.channel.into(),
                context.channel_name.into(),
                context.topic.into(),
                context.hmac.into(),
                0i64.into(),
                0i64.into(),
                Value::Tuple(members),
            ],
        );
    }

    /// Wrap a user record. Nothing is wrapped without a live connection.
    fn user(&mut self, entry: &EntryRef<ClientEntry>) -> Option<Value> {
        if !self.session.is_connected() {
            return None;
        }
        self.session.identities.wrap_user(entry).map(Value::User)
    }

    fn channel(&mut self, entry: &EntryRef<ChannelEntry>) -> Option<Value> {
        self.channel_entry(entry).map(Value::Channel)
    }

    fn channel_entry(&mut self, entry: &EntryRef<ChannelEntry>) -> Option<Channel> {
        if !self.session.is_connected() {
            return None;
        }
        self.session.identities.wrap_channel(entry)
    }

    fn actor(&mut self, actor: &Actor) -> Option<[Value; 2]> {
        let tag = Value::from(actor.id_type().code());
        let value = match actor {
            Actor::User(user) => self.user(user)?,
            Actor::Channel(channel) => self.channel(channel)?,
            Actor::Unknown(_) => Value::None,
        };
        Some([tag, value])
    }

    fn deliver(&mut self, slot: EventSlot, args: Option<Vec<Value>>) {
        match args {
            Some(args) => self.invoke(slot, args),
            None => debug!(%slot, "event references a released entry; dropped"),
        }
    }

    fn invoke(&mut self, slot: EventSlot, args: Vec<Value>) {
        self.answer(slot, args);
    }

    /// Invoke the slot's handler and return its answer. `None` when the slot
    /// holds no handler or the handler failed.
    fn answer(&mut self, slot: EventSlot, args: Vec<Value>) -> Option<Value> {
        let handler = self.callbacks.handler_mut(slot)?;
        let session = &mut *self.session;
        let message = match catch_unwind(AssertUnwindSafe(|| handler.respond(session, &args))) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err.to_string(),
            Err(panic) => {
                if let Some(s) = panic.downcast_ref::<&str>() {
                    format!("handler panicked: {s}")
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    format!("handler panicked: {s}")
                } else {
                    "handler panicked".to_owned()
                }
            }
        };
        error!(%slot, %message, "event handler failed");
        self.failures.push(HandlerFailure { slot, message });
        None
    }
}

const fn notify_slot(notification: &Notification) -> Option<EventSlot> {
    Some(match notification {
        Notification::None { .. } => EventSlot::NotifyNone,
        Notification::Invite { .. } => EventSlot::NotifyInvite,
        Notification::Join { .. } => EventSlot::NotifyJoin,
        Notification::Leave { .. } => EventSlot::NotifyLeave,
        Notification::Signoff { .. } => EventSlot::NotifySignoff,
        Notification::TopicSet { .. } => EventSlot::NotifyTopicSet,
        Notification::NickChange { .. } => EventSlot::NotifyNickChange,
        Notification::CmodeChange { .. } => EventSlot::NotifyCmodeChange,
        Notification::CumodeChange { .. } => EventSlot::NotifyCumodeChange,
        Notification::Motd { .. } => EventSlot::NotifyMotd,
        Notification::ChannelChange { .. } => EventSlot::NotifyChannelChange,
        Notification::ServerSignoff => EventSlot::NotifyServerSignoff,
        Notification::Kicked { .. } => EventSlot::NotifyKicked,
        Notification::Killed { .. } => EventSlot::NotifyKilled,
        Notification::Error { .. } => EventSlot::NotifyError,
        Notification::Watch { .. } => EventSlot::NotifyWatch,
        Notification::Unhandled(_) => return None,
    })
}

const fn reply_slot(command: Command) -> Option<EventSlot> {
    Some(match command {
        Command::Whois => EventSlot::CommandReplyWhois,
        Command::Whowas => EventSlot::CommandReplyWhowas,
        Command::Identify => EventSlot::CommandReplyIdentify,
        Command::Nick => EventSlot::CommandReplyNick,
        Command::List => EventSlot::CommandReplyList,
        Command::Topic => EventSlot::CommandReplyTopic,
        Command::Invite => EventSlot::CommandReplyInvite,
        Command::Kill => EventSlot::CommandReplyKill,
        Command::Info => EventSlot::CommandReplyInfo,
        Command::Stats => EventSlot::CommandReplyStats,
        Command::Ping => EventSlot::CommandReplyPing,
        Command::Oper => EventSlot::CommandReplyOper,
        Command::Join => EventSlot::CommandReplyJoin,
        Command::Motd => EventSlot::CommandReplyMotd,
        Command::Cmode => EventSlot::CommandReplyCmode,
        Command::Cumode => EventSlot::CommandReplyCumode,
        Command::Kick => EventSlot::CommandReplyKick,
        Command::Ban => EventSlot::CommandReplyBan,
        Command::Detach => EventSlot::CommandReplyDetach,
        Command::Watch => EventSlot::CommandReplyWatch,
        Command::Silcoper => EventSlot::CommandReplySilcoper,
        Command::Leave => EventSlot::CommandReplyLeave,
        Command::Users => EventSlot::CommandReplyUsers,
        Command::Service => EventSlot::CommandReplyService,
        Command::Quit | Command::Umode | Command::Getkey => return None,
    })
}
