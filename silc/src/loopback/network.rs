//! Shared state of the loopback network and its scripting handle.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::event::{
    ChannelListing, Event, Notification, PassphraseCompletion, PendingLookup, Reply,
};
use crate::native::{
    ChannelEntry, ChannelId, ClientEntry, ClientId, ConnectionEntry, Entry, EntryRef, MemberList,
};
use crate::toolkit::Identity;
use crate::types::{Command, ConnectionStatus, MessageFlags, Status};

const SERVER_NAME: &str = "loopback.silc";
const DEFAULT_HMAC: &str = "hmac-sha1-96";

/// Where an outgoing message was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A channel, by name.
    Channel(String),
    /// A user, by nickname.
    User(String),
}

/// A message the client sent, as recorded by the loopback network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient.
    pub target: Target,
    /// Flags as passed to the toolkit.
    pub flags: MessageFlags,
    /// Message text.
    pub text: String,
    /// Whether immediate sending was requested.
    pub force_send: bool,
}

/// An entry the network no longer tracks, kept alive for one more pump.
type Released = Box<dyn Any + Send>;

struct Room {
    entry: Entry<ChannelEntry>,
    members: Vec<Entry<ClientEntry>>,
}

impl Room {
    fn has(&self, user: &Entry<ClientEntry>) -> bool {
        self.members.iter().any(|m| m.addr() == user.addr())
    }
}

#[derive(Default)]
pub(super) struct State {
    users: HashMap<String, Entry<ClientEntry>>,
    rooms: HashMap<String, Room>,
    local: Option<Entry<ClientEntry>>,
    connection: Option<Entry<ConnectionEntry>>,
    identity: Option<Identity>,
    queue: VecDeque<Event>,
    released: Vec<Released>,
    retired: Vec<Released>,
    held: Vec<(Vec<EntryRef<ClientEntry>>, PendingLookup)>,
    defer_lookups: bool,
    sent: Vec<SentMessage>,
    passphrases: Vec<Vec<u8>>,
    away: Option<String>,
    motd: Option<String>,
    connect_failure: Option<(ConnectionStatus, Status)>,
    next_id: u32,
    next_socket: i32,
    stopped: bool,
}

impl State {
    pub(super) fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.stopped = false;
    }

    pub(super) fn connect(&mut self, host: &str, port: u16) -> Result<i32> {
        if self.stopped {
            return Err(Error::Toolkit("client stopped".into()));
        }
        let identity = self
            .identity
            .clone()
            .ok_or_else(|| Error::Toolkit("client not initialised".into()))?;
        if host.is_empty() {
            return Err(Error::InvalidArgument("empty host name".into()));
        }
        self.next_socket += 1;
        let socket = self.next_socket + 2;
        self.drop_session();

        if let Some((status, error)) = self.connect_failure.take() {
            self.queue.push_back(Event::Connection {
                status,
                error,
                message: Some(format!("cannot connect to {host}:{port}")),
                connection: None,
            });
            return Ok(socket);
        }

        let id = self.next_client_id();
        let local = Entry::new(ClientEntry {
            nickname: identity.nickname,
            username: identity.username,
            hostname: identity.hostname,
            server: host.to_owned(),
            realname: Some(identity.realname),
            fingerprint: None,
            id,
            mode: 0,
            status: 0,
        });
        let connection = Entry::new(ConnectionEntry {
            remote_host: host.to_owned(),
            port,
            local_entry: local.downgrade(),
        });
        self.queue.push_back(Event::Connection {
            status: ConnectionStatus::Success,
            error: Status::OK,
            message: None,
            connection: Some(connection.downgrade()),
        });
        self.local = Some(local);
        self.connection = Some(connection);
        Ok(socket)
    }

    /// Release the current connection and our own entry, leaving remote
    /// users and their channels in place.
    fn drop_session(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.release(connection);
        }
        let Some(local) = self.local.take() else {
            return;
        };
        let emptied: Vec<String> = self
            .rooms
            .iter_mut()
            .filter_map(|(name, room)| {
                room.members.retain(|m| m.addr() != local.addr());
                room.members.is_empty().then(|| name.clone())
            })
            .collect();
        for name in emptied {
            self.close_empty_room(&name);
        }
        self.release(local);
    }

    fn release(&mut self, entry: impl Any + Send) {
        self.released.push(Box::new(entry));
    }

    pub(super) fn pump(&mut self) -> Vec<Event> {
        self.retired = std::mem::take(&mut self.released);
        self.queue.drain(..).collect()
    }

    pub(super) fn check_connection(&self, conn: &Entry<ConnectionEntry>) -> Result<()> {
        match &self.connection {
            Some(ours) if ours.addr() == conn.addr() => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    pub(super) fn record(&mut self, target: Target, flags: MessageFlags, body: &[u8], force_send: bool) {
        self.sent.push(SentMessage {
            target,
            flags,
            text: String::from_utf8_lossy(body).into_owned(),
            force_send,
        });
    }

    pub(super) fn set_away(&mut self, message: Option<&str>) {
        self.away = message.map(str::to_owned);
    }

    pub(super) fn resolve(&mut self, members: &MemberList, lookup: PendingLookup) {
        let clients: Vec<_> = members
            .iter()
            .filter_map(|id| self.user_by_id(id))
            .map(|entry| entry.downgrade())
            .collect();
        if self.defer_lookups {
            self.held.push((clients, lookup));
        } else {
            self.queue
                .push_back(Event::ClientsResolved { clients, lookup });
        }
    }

    pub(super) fn stop(&mut self) {
        self.stopped = true;
        self.queue.clear();
        self.held.clear();
        self.users.clear();
        self.rooms.clear();
        self.local = None;
        self.connection = None;
        self.released.clear();
        self.retired.clear();
    }

    /// Run a parsed command line and queue its events.
    pub(super) fn command(&mut self, line: &str) -> Result<()> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| Error::InvalidArgument("empty command line".into()))?;
        let verb = verb.strip_prefix('/').unwrap_or(verb);
        let command = Command::from_name(verb)
            .ok_or_else(|| Error::Toolkit(format!("unknown command `{verb}`")))?;
        let args: Vec<&str> = words.collect();

        self.queue.push_back(Event::Command {
            success: true,
            command,
            status: Status::OK,
        });

        let outcome = match command {
            Command::Join => self.join_self(&args),
            Command::Leave => self.leave_self(&args),
            Command::Nick => self.nick(&args),
            Command::Topic => self.topic(&args),
            Command::Ping => Ok(Reply::Ping),
            Command::Motd => Ok(Reply::Motd {
                motd: self.motd.clone(),
            }),
            Command::Whois => self.whois(&args),
            Command::Users => self.users(&args),
            Command::Kick => self.kick(&args),
            Command::List => {
                self.list();
                return Ok(());
            }
            _ => Err(Status::ERR_UNKNOWN_COMMAND),
        };
        match outcome {
            Ok(reply) => self.reply(command, Status::OK, reply),
            Err(error) => self.queue.push_back(Event::CommandReply {
                command,
                status: error,
                error,
                reply: None,
            }),
        }
        Ok(())
    }

    fn reply(&mut self, command: Command, status: Status, reply: Reply) {
        self.queue.push_back(Event::CommandReply {
            command,
            status,
            error: Status::OK,
            reply: Some(reply),
        });
    }

    fn local(&self) -> std::result::Result<Entry<ClientEntry>, Status> {
        self.local.clone().ok_or(Status::ERR_NOT_ON_CHANNEL)
    }

    fn join_self(&mut self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let name = *args.first().ok_or(Status::ERR_NOT_ENOUGH_PARAMS)?;
        let local = self.local()?;
        let room = self.room_or_create(name);
        if room.has(&local) {
            return Err(Status::ERR_USER_ON_CHANNEL);
        }
        room.members.push(local);
        let channel = room.entry.read();
        Ok(Reply::Join {
            channel_name: channel.channel_name.clone(),
            channel: room.entry.downgrade(),
            mode: channel.mode,
            topic: channel.topic.clone(),
            hmac: Some(DEFAULT_HMAC.to_owned()),
            members: MemberList(room.members.iter().map(|m| m.read().id).collect()),
            user_limit: channel.user_limit,
        })
    }

    fn leave_self(&mut self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let name = *args.first().ok_or(Status::ERR_NOT_ENOUGH_PARAMS)?;
        let local = self.local()?;
        let room = self.rooms.get_mut(name).ok_or(Status::ERR_NO_SUCH_CHANNEL)?;
        if !room.has(&local) {
            return Err(Status::ERR_NOT_ON_CHANNEL);
        }
        room.members.retain(|m| m.addr() != local.addr());
        let reply = Reply::Leave {
            channel: room.entry.downgrade(),
        };
        self.close_empty_room(name);
        Ok(reply)
    }

    fn nick(&mut self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let nickname = *args.first().ok_or(Status::ERR_NOT_ENOUGH_PARAMS)?;
        if self.find_user(nickname).is_some() {
            return Err(Status::ERR_NICKNAME_IN_USE);
        }
        let local = self.local()?;
        let new_id = self.next_client_id();
        let old_id = {
            let mut entry = local.write();
            entry.nickname = nickname.to_owned();
            std::mem::replace(&mut entry.id, new_id)
        };
        Ok(Reply::Nick {
            user: local.downgrade(),
            nickname: nickname.to_owned(),
            old_id,
        })
    }

    fn topic(&mut self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let (name, text) = args.split_first().ok_or(Status::ERR_NOT_ENOUGH_PARAMS)?;
        let room = self.rooms.get(*name).ok_or(Status::ERR_NO_SUCH_CHANNEL)?;
        if !text.is_empty() {
            room.entry.write().topic = Some(text.join(" "));
        }
        Ok(Reply::Topic {
            channel: room.entry.downgrade(),
            topic: room.entry.read().topic.clone(),
        })
    }

    fn whois(&self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let nickname = *args.first().ok_or(Status::ERR_NOT_ENOUGH_PARAMS)?;
        let user = self.find_user(nickname).ok_or(Status::ERR_NO_SUCH_NICK)?;
        let entry = user.read();
        Ok(Reply::Whois {
            user: user.downgrade(),
            nickname: entry.nickname.clone(),
            username: entry.username.clone(),
            realname: entry.realname.clone(),
            mode: entry.mode,
            idle: 0,
        })
    }

    fn users(&self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let name = *args.first().ok_or(Status::ERR_NOT_ENOUGH_PARAMS)?;
        let room = self.rooms.get(name).ok_or(Status::ERR_NO_SUCH_CHANNEL)?;
        Ok(Reply::Users {
            channel: room.entry.downgrade(),
            members: room.members.iter().map(Entry::downgrade).collect(),
        })
    }

    fn kick(&mut self, args: &[&str]) -> std::result::Result<Reply, Status> {
        let [name, nickname, reason @ ..] = args else {
            return Err(Status::ERR_NOT_ENOUGH_PARAMS);
        };
        let local = self.local()?;
        let user = self.find_user(nickname).ok_or(Status::ERR_NO_SUCH_NICK)?;
        let room = self.rooms.get_mut(*name).ok_or(Status::ERR_NO_SUCH_CHANNEL)?;
        if !room.has(&local) {
            return Err(Status::ERR_NOT_ON_CHANNEL);
        }
        if !room.has(&user) {
            return Err(Status::ERR_USER_NOT_ON_CHANNEL);
        }
        room.members.retain(|m| m.addr() != user.addr());
        let channel = room.entry.downgrade();
        let message = (!reason.is_empty()).then(|| reason.join(" "));
        self.queue.push_back(Event::Notify(Notification::Kicked {
            kicked: user.downgrade(),
            message,
            kicker: local.downgrade(),
            channel: channel.clone(),
        }));
        Ok(Reply::Kick {
            channel,
            user: user.downgrade(),
        })
    }

    fn list(&mut self) {
        let mut names: Vec<&String> = self.rooms.keys().collect();
        names.sort();
        let listings: Vec<ChannelListing> = names
            .into_iter()
            .filter_map(|name| self.rooms.get(name))
            .map(|room| {
                let channel = room.entry.read();
                ChannelListing {
                    channel: room.entry.downgrade(),
                    name: channel.channel_name.clone(),
                    topic: channel.topic.clone(),
                    user_count: u32::try_from(room.members.len()).unwrap_or(u32::MAX),
                }
            })
            .collect();
        let last = listings.len().saturating_sub(1);
        if listings.is_empty() {
            self.reply(Command::List, Status::OK, Reply::List(None));
        }
        for (i, listing) in listings.into_iter().enumerate() {
            let status = match (i, last) {
                (_, 0) => Status::OK,
                (0, _) => Status::LIST_START,
                (i, last) if i == last => Status::LIST_END,
                _ => Status::LIST_ITEM,
            };
            self.reply(Command::List, status, Reply::List(Some(listing)));
        }
    }

    fn room_or_create(&mut self, name: &str) -> &mut Room {
        let next_id = &mut self.next_id;
        self.rooms.entry(name.to_owned()).or_insert_with(|| {
            *next_id += 1;
            Room {
                entry: Entry::new(ChannelEntry {
                    channel_name: name.to_owned(),
                    topic: None,
                    id: channel_id(*next_id),
                    mode: 0,
                    user_limit: 0,
                }),
                members: Vec::new(),
            }
        })
    }

    fn close_empty_room(&mut self, name: &str) {
        if self.rooms.get(name).is_some_and(|room| room.members.is_empty()) {
            if let Some(room) = self.rooms.remove(name) {
                self.release(room.entry);
            }
        }
    }

    fn find_user(&self, nickname: &str) -> Option<Entry<ClientEntry>> {
        self.local
            .iter()
            .chain(self.users.values())
            .find(|entry| entry.read().nickname == nickname)
            .cloned()
    }

    fn user_by_id(&self, id: &ClientId) -> Option<Entry<ClientEntry>> {
        self.local
            .iter()
            .chain(self.users.values())
            .find(|entry| entry.read().id == *id)
            .cloned()
    }

    fn next_client_id(&mut self) -> ClientId {
        self.next_id += 1;
        let mut raw = [0u8; ClientId::LEN];
        raw[0] = 0x0a;
        raw[ClientId::LEN - 4..].copy_from_slice(&self.next_id.to_be_bytes());
        ClientId(raw)
    }
}

fn channel_id(n: u32) -> ChannelId {
    let mut raw = [0u8; ChannelId::LEN];
    raw[0] = 0x0c;
    raw[ChannelId::LEN - 4..].copy_from_slice(&n.to_be_bytes());
    ChannelId(raw)
}

/// Scripting handle to a loopback network.
///
/// Clones share the same network. Tests and demo hosts use it to play the
/// part of other users and of the server, and to inspect what the client
/// sent.
#[derive(Clone, Default)]
pub struct Network {
    pub(super) state: Arc<Mutex<State>>,
}

impl Network {
    /// An empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a remote user, or return the existing one with that nickname.
    pub fn add_user(&self, nickname: &str) -> EntryRef<ClientEntry> {
        let mut state = self.state.lock();
        if let Some(existing) = state.find_user(nickname) {
            return existing.downgrade();
        }
        let id = state.next_client_id();
        let entry = Entry::new(ClientEntry {
            nickname: nickname.to_owned(),
            username: nickname.to_lowercase(),
            hostname: "remote.invalid".to_owned(),
            server: SERVER_NAME.to_owned(),
            realname: None,
            fingerprint: None,
            id,
            mode: 0,
            status: 0,
        });
        let weak = entry.downgrade();
        state.users.insert(nickname.to_owned(), entry);
        weak
    }

    /// Have a remote user join a channel, creating either if needed.
    pub fn join(&self, nickname: &str, channel: &str) -> EntryRef<ChannelEntry> {
        let user_ref = self.add_user(nickname);
        let mut state = self.state.lock();
        let Some(user) = user_ref.upgrade() else {
            return EntryRef::dangling();
        };
        let room = state.room_or_create(channel);
        let channel_ref = room.entry.downgrade();
        if !room.has(&user) {
            room.members.push(user);
        }
        state.queue.push_back(Event::Notify(Notification::Join {
            user: user_ref,
            channel: channel_ref.clone(),
        }));
        channel_ref
    }

    /// Have a remote user leave a channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the user is not on the channel.
    pub fn leave(&self, nickname: &str, channel: &str) -> Result<()> {
        let mut state = self.state.lock();
        let user = state
            .find_user(nickname)
            .ok_or_else(|| Error::InvalidArgument(format!("no user `{nickname}`")))?;
        let room = state
            .rooms
            .get_mut(channel)
            .filter(|room| room.has(&user))
            .ok_or_else(|| Error::InvalidArgument(format!("`{nickname}` is not on `{channel}`")))?;
        room.members.retain(|m| m.addr() != user.addr());
        let channel_ref = room.entry.downgrade();
        state.queue.push_back(Event::Notify(Notification::Leave {
            user: user.downgrade(),
            channel: channel_ref,
        }));
        state.close_empty_room(channel);
        Ok(())
    }

    /// Deliver a channel message from a remote user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the user or channel is unknown.
    pub fn say(&self, nickname: &str, channel: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        let sender = state
            .find_user(nickname)
            .ok_or_else(|| Error::InvalidArgument(format!("no user `{nickname}`")))?;
        let room = state
            .rooms
            .get(channel)
            .ok_or_else(|| Error::InvalidArgument(format!("no channel `{channel}`")))?;
        let channel = room.entry.downgrade();
        state.queue.push_back(Event::ChannelMessage {
            sender: sender.downgrade(),
            channel,
            flags: MessageFlags::UTF8,
            payload: text.as_bytes().to_vec(),
        });
        Ok(())
    }

    /// Deliver a private message from a remote user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the user is unknown.
    pub fn whisper(&self, nickname: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        let sender = state
            .find_user(nickname)
            .ok_or_else(|| Error::InvalidArgument(format!("no user `{nickname}`")))?;
        state.queue.push_back(Event::PrivateMessage {
            sender: sender.downgrade(),
            flags: MessageFlags::UTF8,
            payload: text.as_bytes().to_vec(),
        });
        Ok(())
    }

    /// Sign a remote user off the network. Its entry is released after the
    /// next pump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the user is unknown.
    pub fn signoff(&self, nickname: &str, message: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        let user = state
            .users
            .remove(nickname)
            .ok_or_else(|| Error::InvalidArgument(format!("no user `{nickname}`")))?;
        let emptied: Vec<String> = state
            .rooms
            .iter_mut()
            .filter_map(|(name, room)| {
                room.members.retain(|m| m.addr() != user.addr());
                room.members.is_empty().then(|| name.clone())
            })
            .collect();
        for name in emptied {
            state.close_empty_room(&name);
        }
        state.queue.push_back(Event::Notify(Notification::Signoff {
            user: user.downgrade(),
            message: message.map(str::to_owned),
        }));
        state.release(user);
        Ok(())
    }

    /// Drop the connection. Every entry is released after the next pump.
    pub fn disconnect(&self, reason: &str) {
        let mut state = self.state.lock();
        if state.connection.is_none() {
            return;
        }
        state.drop_session();
        let rooms: Vec<Room> = state.rooms.drain().map(|(_, room)| room).collect();
        for room in rooms {
            state.release(room.entry);
        }
        let users: Vec<Entry<ClientEntry>> = state.users.drain().map(|(_, user)| user).collect();
        for user in users {
            state.release(user);
        }
        state.queue.push_back(Event::Connection {
            status: ConnectionStatus::Disconnected,
            error: Status::OK,
            message: Some(reason.to_owned()),
            connection: None,
        });
    }

    /// Queue an arbitrary event for the next pump.
    pub fn push(&self, event: Event) {
        self.state.lock().queue.push_back(event);
    }

    /// Ask the client for a passphrase. The answer is recorded once the
    /// request is dispatched; see [`passphrases`](Self::passphrases).
    pub fn ask_passphrase(&self) {
        let state: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        let completion = PassphraseCompletion::new(move |passphrase| {
            if let Some(state) = state.upgrade() {
                state.lock().passphrases.push(passphrase.to_vec());
            }
        });
        self.push(Event::PassphraseRequested { completion });
    }

    /// Passphrases the client has answered with, oldest first.
    #[must_use]
    pub fn passphrases(&self) -> Vec<Vec<u8>> {
        self.state.lock().passphrases.clone()
    }

    /// Make the next connection attempt fail with the given status.
    pub fn fail_next_connect(&self, status: ConnectionStatus, error: Status) {
        self.state.lock().connect_failure = Some((status, error));
    }

    /// Set the text returned by MOTD.
    pub fn set_motd(&self, motd: &str) {
        self.state.lock().motd = Some(motd.to_owned());
    }

    /// Hold member lookups instead of completing them on the next pump.
    pub fn defer_lookups(&self, defer: bool) {
        self.state.lock().defer_lookups = defer;
    }

    /// Complete every held member lookup on the next pump.
    pub fn release_lookups(&self) {
        let mut state = self.state.lock();
        let held = std::mem::take(&mut state.held);
        for (clients, lookup) in held {
            state
                .queue
                .push_back(Event::ClientsResolved { clients, lookup });
        }
    }

    /// Number of member lookups currently held.
    #[must_use]
    pub fn held_lookups(&self) -> usize {
        self.state.lock().held.len()
    }

    /// Messages the client has sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// The client's current away message.
    #[must_use]
    pub fn away(&self) -> Option<String> {
        self.state.lock().away.clone()
    }

    /// Look up a user (remote or our own) by nickname.
    #[must_use]
    pub fn user(&self, nickname: &str) -> Option<EntryRef<ClientEntry>> {
        self.state.lock().find_user(nickname).map(|e| e.downgrade())
    }

    /// Look up a channel by name.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<EntryRef<ChannelEntry>> {
        self.state
            .lock()
            .rooms
            .get(name)
            .map(|room| room.entry.downgrade())
    }

    /// Our own user entry, while connected.
    #[must_use]
    pub fn local_user(&self) -> Option<EntryRef<ClientEntry>> {
        self.state.lock().local.as_ref().map(Entry::downgrade)
    }

    /// Nicknames on a channel, in join order.
    #[must_use]
    pub fn members(&self, channel: &str) -> Vec<String> {
        self.state
            .lock()
            .rooms
            .get(channel)
            .map(|room| {
                room.members
                    .iter()
                    .map(|m| m.read().nickname.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of events waiting for the next pump.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Network")
            .field("users", &state.users.len())
            .field("channels", &state.rooms.len())
            .field("connected", &state.connection.is_some())
            .field("pending", &state.queue.len())
            .finish_non_exhaustive()
    }
}
