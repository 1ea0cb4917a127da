//! Typed events produced by the toolkit.
//!
//! Every native callback is decoded once, at the toolkit boundary, into one
//! of these values. Entities are carried as [`EntryRef`]s; turning them into
//! wrappers is the dispatcher's job.

use std::fmt;

use crate::entity::Channel;
use crate::native::{ChannelEntry, ClientEntry, ClientId, ConnectionEntry, EntryRef, MemberList};
use crate::types::{
    Command, ConnectionStatus, IdType, MessageFlags, MessageType, NotifyType, Status,
};

/// An event ready for dispatch.
#[derive(Debug)]
pub enum Event {
    /// Text the toolkit wants shown to the user.
    Say {
        /// Severity.
        kind: MessageType,
        /// Message text.
        message: String,
    },
    /// Message sent to a channel we are on.
    ChannelMessage {
        /// Sender.
        sender: EntryRef<ClientEntry>,
        /// Target channel.
        channel: EntryRef<ChannelEntry>,
        /// Message flags.
        flags: MessageFlags,
        /// Raw message body.
        payload: Vec<u8>,
    },
    /// Message sent directly to us.
    PrivateMessage {
        /// Sender.
        sender: EntryRef<ClientEntry>,
        /// Message flags.
        flags: MessageFlags,
        /// Raw message body.
        payload: Vec<u8>,
    },
    /// Asynchronous server notification.
    Notify(Notification),
    /// A command was sent (or failed to be sent) to the server.
    Command {
        /// Whether the command was accepted locally.
        success: bool,
        /// Command kind.
        command: Command,
        /// Local status.
        status: Status,
    },
    /// Reply to a previously sent command.
    CommandReply {
        /// Command kind.
        command: Command,
        /// Reply status.
        status: Status,
        /// Error code, meaningful when `status` is not OK.
        error: Status,
        /// Decoded payload. Absent for error replies and for commands with
        /// no decodable payload.
        reply: Option<Reply>,
    },
    /// Connection state changed.
    Connection {
        /// New state.
        status: ConnectionStatus,
        /// Protocol error, [`Status::OK`] when none.
        error: Status,
        /// Descriptive text from the toolkit.
        message: Option<String>,
        /// The connection, present for successful connects.
        connection: Option<EntryRef<ConnectionEntry>>,
    },
    /// Session detach data to persist for a later resume.
    Detach {
        /// Opaque detach blob.
        data: Vec<u8>,
    },
    /// The toolkit needs a passphrase, for example to unlock a private key or
    /// to authenticate to a server.
    PassphraseRequested {
        /// Receives the host's answer.
        completion: PassphraseCompletion,
    },
    /// Completion of a [`Toolkit::resolve_clients`](crate::Toolkit::resolve_clients) request.
    ClientsResolved {
        /// Resolved members, in the order requested.
        clients: Vec<EntryRef<ClientEntry>>,
        /// The correlation record handed to the request.
        lookup: PendingLookup,
    },
}

/// Continuation of a passphrase request. Called exactly once with the
/// passphrase bytes, empty when the host has none to give.
pub struct PassphraseCompletion(Box<dyn FnOnce(&[u8]) + Send>);

impl PassphraseCompletion {
    /// Wrap the toolkit's continuation.
    pub fn new(f: impl FnOnce(&[u8]) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub(crate) fn complete(self, passphrase: &[u8]) {
        (self.0)(passphrase);
    }
}

impl fmt::Debug for PassphraseCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PassphraseCompletion(..)")
    }
}

/// Who performed a channel operation.
#[derive(Debug, Clone)]
pub enum Actor {
    /// A user.
    User(EntryRef<ClientEntry>),
    /// A channel.
    Channel(EntryRef<ChannelEntry>),
    /// An entity kind with no wrapper, such as a server.
    Unknown(IdType),
}

impl Actor {
    /// The entity tag of this actor.
    #[must_use]
    pub const fn id_type(&self) -> IdType {
        match self {
            Self::User(_) => IdType::Client,
            Self::Channel(_) => IdType::Channel,
            Self::Unknown(tag) => *tag,
        }
    }
}

/// Server notifications, one variant per kind.
#[derive(Debug)]
pub enum Notification {
    /// Free-form notice.
    None {
        /// Notice text.
        message: String,
    },
    /// We were invited to a channel.
    Invite {
        /// The channel, if already known to us.
        channel: Option<EntryRef<ChannelEntry>>,
        /// Channel name.
        channel_name: String,
        /// Who invited us.
        inviter: EntryRef<ClientEntry>,
    },
    /// A user joined a channel.
    Join {
        /// Joining user.
        user: EntryRef<ClientEntry>,
        /// Channel joined.
        channel: EntryRef<ChannelEntry>,
    },
    /// A user left a channel.
    Leave {
        /// Leaving user.
        user: EntryRef<ClientEntry>,
        /// Channel left.
        channel: EntryRef<ChannelEntry>,
    },
    /// A user signed off.
    Signoff {
        /// Departing user.
        user: EntryRef<ClientEntry>,
        /// Quit message.
        message: Option<String>,
    },
    /// A channel topic was set.
    TopicSet {
        /// Who set it.
        actor: Actor,
        /// Affected channel.
        channel: EntryRef<ChannelEntry>,
        /// New topic.
        topic: String,
    },
    /// A user changed nickname.
    NickChange {
        /// Entry before the change.
        old: EntryRef<ClientEntry>,
        /// Entry after the change.
        new: EntryRef<ClientEntry>,
    },
    /// Channel mode changed.
    CmodeChange {
        /// Who changed it.
        actor: Actor,
        /// New mode bits.
        mode: u32,
        /// Cipher name, if changed.
        cipher: Option<String>,
        /// HMAC name, if changed.
        hmac: Option<String>,
        /// Channel passphrase, if changed.
        passphrase: Option<String>,
        /// Affected channel.
        channel: EntryRef<ChannelEntry>,
    },
    /// A user's mode on a channel changed.
    CumodeChange {
        /// Who changed it.
        actor: Actor,
        /// New mode bits.
        mode: u32,
        /// Affected channel.
        channel: EntryRef<ChannelEntry>,
        /// Affected user.
        target: EntryRef<ClientEntry>,
    },
    /// Message of the day.
    Motd {
        /// MOTD text.
        message: String,
    },
    /// A channel's identifier changed.
    ChannelChange {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
    },
    /// A server left the network.
    ServerSignoff,
    /// A user was kicked.
    Kicked {
        /// Kicked user.
        kicked: EntryRef<ClientEntry>,
        /// Kick reason.
        message: Option<String>,
        /// Who kicked.
        kicker: EntryRef<ClientEntry>,
        /// Channel kicked from.
        channel: EntryRef<ChannelEntry>,
    },
    /// A user was killed from the network.
    Killed {
        /// Killed user.
        killed: EntryRef<ClientEntry>,
        /// Kill reason.
        message: Option<String>,
        /// Who killed.
        actor: Actor,
        /// Channel the kill was seen on, if any.
        channel: Option<EntryRef<ChannelEntry>>,
    },
    /// Error reported by the server.
    Error {
        /// Error code.
        error: Status,
    },
    /// A watched user changed state.
    Watch {
        /// The watched user.
        user: EntryRef<ClientEntry>,
        /// New nickname, for nick changes.
        new_nick: Option<String>,
        /// User mode.
        mode: u32,
        /// What happened.
        notification: NotifyType,
    },
    /// A kind with no handler slot.
    Unhandled(NotifyType),
}

impl Notification {
    /// The notification's kind tag.
    #[must_use]
    pub const fn kind(&self) -> NotifyType {
        match self {
            Self::None { .. } => NotifyType::None,
            Self::Invite { .. } => NotifyType::Invite,
            Self::Join { .. } => NotifyType::Join,
            Self::Leave { .. } => NotifyType::Leave,
            Self::Signoff { .. } => NotifyType::Signoff,
            Self::TopicSet { .. } => NotifyType::TopicSet,
            Self::NickChange { .. } => NotifyType::NickChange,
            Self::CmodeChange { .. } => NotifyType::CmodeChange,
            Self::CumodeChange { .. } => NotifyType::CumodeChange,
            Self::Motd { .. } => NotifyType::Motd,
            Self::ChannelChange { .. } => NotifyType::ChannelChange,
            Self::ServerSignoff => NotifyType::ServerSignoff,
            Self::Kicked { .. } => NotifyType::Kicked,
            Self::Killed { .. } => NotifyType::Killed,
            Self::Error { .. } => NotifyType::Error,
            Self::Watch { .. } => NotifyType::Watch,
            Self::Unhandled(kind) => *kind,
        }
    }
}

/// One entry of a LIST reply.
#[derive(Debug, Clone)]
pub struct ChannelListing {
    /// The channel.
    pub channel: EntryRef<ChannelEntry>,
    /// Channel name.
    pub name: String,
    /// Channel topic.
    pub topic: Option<String>,
    /// Number of members.
    pub user_count: u32,
}

/// Payload of a successful command reply.
#[derive(Debug)]
pub enum Reply {
    /// WHOIS.
    Whois {
        /// The user.
        user: EntryRef<ClientEntry>,
        /// Nickname.
        nickname: String,
        /// Login name.
        username: String,
        /// Real name.
        realname: Option<String>,
        /// User mode.
        mode: u32,
        /// Idle time in seconds.
        idle: u32,
    },
    /// WHOWAS.
    Whowas {
        /// The user.
        user: EntryRef<ClientEntry>,
        /// Nickname.
        nickname: String,
        /// Login name.
        username: String,
        /// Real name.
        realname: Option<String>,
    },
    /// IDENTIFY.
    Identify {
        /// Entity name.
        name: Option<String>,
        /// Extra info.
        info: Option<String>,
    },
    /// NICK.
    Nick {
        /// Our own entry.
        user: EntryRef<ClientEntry>,
        /// New nickname.
        nickname: String,
        /// Identifier held before the change.
        old_id: ClientId,
    },
    /// LIST. `None` when the server has no channels.
    List(Option<ChannelListing>),
    /// TOPIC.
    Topic {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// Current topic.
        topic: Option<String>,
    },
    /// INVITE.
    Invite {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// Invite list entries.
        invites: Vec<String>,
    },
    /// KILL.
    Kill {
        /// The killed user, if known.
        user: Option<EntryRef<ClientEntry>>,
    },
    /// PING.
    Ping,
    /// OPER.
    Oper,
    /// JOIN. Members are identifiers only and must be resolved.
    Join {
        /// Channel name.
        channel_name: String,
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// Channel mode.
        mode: u32,
        /// Channel topic.
        topic: Option<String>,
        /// HMAC name.
        hmac: Option<String>,
        /// Member identifiers.
        members: MemberList,
        /// Member limit.
        user_limit: u32,
    },
    /// MOTD.
    Motd {
        /// MOTD text.
        motd: Option<String>,
    },
    /// CMODE.
    Cmode {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// Channel mode.
        mode: u32,
        /// Member limit.
        user_limit: u32,
    },
    /// CUMODE.
    Cumode {
        /// New mode bits.
        mode: u32,
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// The user.
        user: EntryRef<ClientEntry>,
    },
    /// KICK.
    Kick {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// The kicked user.
        user: EntryRef<ClientEntry>,
    },
    /// BAN.
    Ban {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// Ban list entries, if returned.
        bans: Option<Vec<String>>,
    },
    /// DETACH.
    Detach,
    /// WATCH.
    Watch,
    /// SILCOPER.
    Silcoper,
    /// LEAVE.
    Leave {
        /// The channel left.
        channel: EntryRef<ChannelEntry>,
    },
    /// USERS.
    Users {
        /// The channel.
        channel: EntryRef<ChannelEntry>,
        /// Members as currently cached.
        members: Vec<EntryRef<ClientEntry>>,
    },
}

impl Reply {
    /// The command this payload belongs to.
    #[must_use]
    pub const fn command(&self) -> Command {
        match self {
            Self::Whois { .. } => Command::Whois,
            Self::Whowas { .. } => Command::Whowas,
            Self::Identify { .. } => Command::Identify,
            Self::Nick { .. } => Command::Nick,
            Self::List(_) => Command::List,
            Self::Topic { .. } => Command::Topic,
            Self::Invite { .. } => Command::Invite,
            Self::Kill { .. } => Command::Kill,
            Self::Ping => Command::Ping,
            Self::Oper => Command::Oper,
            Self::Join { .. } => Command::Join,
            Self::Motd { .. } => Command::Motd,
            Self::Cmode { .. } => Command::Cmode,
            Self::Cumode { .. } => Command::Cumode,
            Self::Kick { .. } => Command::Kick,
            Self::Ban { .. } => Command::Ban,
            Self::Detach => Command::Detach,
            Self::Watch => Command::Watch,
            Self::Silcoper => Command::Silcoper,
            Self::Leave { .. } => Command::Leave,
            Self::Users { .. } => Command::Users,
        }
    }
}

/// State carried from a JOIN reply to its member-resolution completion.
pub(crate) struct JoinContext {
    pub(crate) channel: Channel,
    pub(crate) channel_name: String,
    pub(crate) topic: Option<String>,
    pub(crate) hmac: Option<String>,
    pub(crate) mode: u32,
    pub(crate) user_limit: u32,
    pub(crate) epoch: u64,
}

/// Correlation record for an in-flight member lookup.
///
/// Handed to [`Toolkit::resolve_clients`](crate::Toolkit::resolve_clients) and
/// returned unchanged in [`Event::ClientsResolved`]. The dispatcher consumes
/// it on completion; dropping it instead abandons the lookup.
pub struct PendingLookup(pub(crate) Box<JoinContext>);

impl PendingLookup {
    pub(crate) fn new(context: JoinContext) -> Self {
        Self(Box::new(context))
    }

    pub(crate) fn into_context(self) -> JoinContext {
        *self.0
    }
}

impl fmt::Debug for PendingLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLookup")
            .field("channel_name", &self.0.channel_name)
            .field("epoch", &self.0.epoch)
            .finish_non_exhaustive()
    }
}
