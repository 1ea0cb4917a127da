//! Protocol constants: entity tags, connection states, notification and
//! command kinds, status codes and message flags.

use std::fmt;

macro_rules! ffi_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident {
        $($(#[$vm:meta])* $variant:ident = $val:expr),* $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        $vis enum $name { $($(#[$vm])* $variant = $val),* }

        impl $name {
            /// Convert from the toolkit's numeric tag. Returns `None` for unknown values.
            #[must_use]
            pub const fn from_ffi(v: i32) -> Option<Self> {
                match v { $($val => Some(Self::$variant),)* _ => None }
            }

            /// The toolkit's numeric tag.
            #[must_use]
            pub const fn code(self) -> i32 {
                self as i32
            }
        }
    };
}

ffi_enum! {
    /// Kind tag of a native entity. Used by notifications whose actor may be
    /// a user, a channel or a server.
    pub enum IdType {
        /// A server entity (no wrapper type).
        Server = 1,
        /// A client (user) entity.
        Client = 2,
        /// A channel entity.
        Channel = 3,
    }
}

ffi_enum! {
    /// Connection state reported by the toolkit's connect callback.
    pub enum ConnectionStatus {
        /// Connection and key exchange completed.
        Success = 0,
        /// Detached session resumed.
        SuccessResume = 1,
        /// Remote end closed the connection.
        Disconnected = 2,
        /// Generic connection error.
        Error = 3,
        /// Key exchange failed.
        ErrorKe = 4,
        /// Authentication failed.
        ErrorAuth = 5,
        /// Resuming a detached session failed.
        ErrorResume = 6,
        /// Connection attempt timed out.
        ErrorTimeout = 7,
    }
}

impl ConnectionStatus {
    /// Whether this status means the connection is now usable.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::SuccessResume)
    }
}

ffi_enum! {
    /// Asynchronous notification kinds.
    pub enum NotifyType {
        /// Free-form server notice.
        None = 0,
        /// Invitation to a channel.
        Invite = 1,
        /// User joined a channel.
        Join = 2,
        /// User left a channel.
        Leave = 3,
        /// User signed off the network.
        Signoff = 4,
        /// Channel topic changed.
        TopicSet = 5,
        /// User changed nickname.
        NickChange = 6,
        /// Channel mode changed.
        CmodeChange = 7,
        /// User's mode on a channel changed.
        CumodeChange = 8,
        /// Message of the day.
        Motd = 9,
        /// Channel identifier changed.
        ChannelChange = 10,
        /// A server signed off.
        ServerSignoff = 11,
        /// User was kicked from a channel.
        Kicked = 12,
        /// User was killed from the network.
        Killed = 13,
        /// User mode changed.
        UmodeChange = 14,
        /// Channel ban list changed.
        Ban = 15,
        /// Error notification from the server.
        Error = 16,
        /// Watched user changed state.
        Watch = 17,
    }
}

ffi_enum! {
    /// Protocol commands.
    pub enum Command {
        /// WHOIS
        Whois = 1,
        /// WHOWAS
        Whowas = 2,
        /// IDENTIFY
        Identify = 3,
        /// NICK
        Nick = 4,
        /// LIST
        List = 5,
        /// TOPIC
        Topic = 6,
        /// INVITE
        Invite = 7,
        /// QUIT
        Quit = 8,
        /// KILL
        Kill = 9,
        /// INFO
        Info = 10,
        /// STATS
        Stats = 11,
        /// PING
        Ping = 12,
        /// OPER
        Oper = 13,
        /// JOIN
        Join = 14,
        /// MOTD
        Motd = 15,
        /// UMODE
        Umode = 16,
        /// CMODE
        Cmode = 17,
        /// CUMODE
        Cumode = 18,
        /// KICK
        Kick = 19,
        /// BAN
        Ban = 20,
        /// DETACH
        Detach = 21,
        /// WATCH
        Watch = 22,
        /// SILCOPER
        Silcoper = 23,
        /// LEAVE
        Leave = 24,
        /// USERS
        Users = 25,
        /// GETKEY
        Getkey = 26,
        /// SERVICE
        Service = 27,
    }
}

impl Command {
    /// Every command, in tag order.
    pub const ALL: [Self; 27] = [
        Self::Whois,
        Self::Whowas,
        Self::Identify,
        Self::Nick,
        Self::List,
        Self::Topic,
        Self::Invite,
        Self::Quit,
        Self::Kill,
        Self::Info,
        Self::Stats,
        Self::Ping,
        Self::Oper,
        Self::Join,
        Self::Motd,
        Self::Umode,
        Self::Cmode,
        Self::Cumode,
        Self::Kick,
        Self::Ban,
        Self::Detach,
        Self::Watch,
        Self::Silcoper,
        Self::Leave,
        Self::Users,
        Self::Getkey,
        Self::Service,
    ];

    /// Upper-case command name as typed on a command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Whois => "WHOIS",
            Self::Whowas => "WHOWAS",
            Self::Identify => "IDENTIFY",
            Self::Nick => "NICK",
            Self::List => "LIST",
            Self::Topic => "TOPIC",
            Self::Invite => "INVITE",
            Self::Quit => "QUIT",
            Self::Kill => "KILL",
            Self::Info => "INFO",
            Self::Stats => "STATS",
            Self::Ping => "PING",
            Self::Oper => "OPER",
            Self::Join => "JOIN",
            Self::Motd => "MOTD",
            Self::Umode => "UMODE",
            Self::Cmode => "CMODE",
            Self::Cumode => "CUMODE",
            Self::Kick => "KICK",
            Self::Ban => "BAN",
            Self::Detach => "DETACH",
            Self::Watch => "WATCH",
            Self::Silcoper => "SILCOPER",
            Self::Leave => "LEAVE",
            Self::Users => "USERS",
            Self::Getkey => "GETKEY",
            Self::Service => "SERVICE",
        }
    }

    /// Look up a command by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

ffi_enum! {
    /// Severity of a `say` message emitted by the toolkit itself.
    pub enum MessageType {
        /// Informational.
        Info = 0,
        /// Warning.
        Warning = 1,
        /// Error.
        Error = 2,
        /// Audit trail.
        Audit = 3,
    }
}

/// Command or notification status code.
///
/// Unlike the other tags this keeps unknown values, since the error code is
/// forwarded verbatim to `command_reply_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Status(pub u8);

impl Status {
    /// Success.
    pub const OK: Self = Self(0);
    /// First item of a multi-part reply.
    pub const LIST_START: Self = Self(1);
    /// Middle item of a multi-part reply.
    pub const LIST_ITEM: Self = Self(2);
    /// Last item of a multi-part reply.
    pub const LIST_END: Self = Self(3);
    /// No such nickname.
    pub const ERR_NO_SUCH_NICK: Self = Self(10);
    /// No such channel.
    pub const ERR_NO_SUCH_CHANNEL: Self = Self(11);
    /// Unknown command.
    pub const ERR_UNKNOWN_COMMAND: Self = Self(15);
    /// Nickname already taken.
    pub const ERR_NICKNAME_IN_USE: Self = Self(24);
    /// Caller is not on the channel.
    pub const ERR_NOT_ON_CHANNEL: Self = Self(25);
    /// Target user is not on the channel.
    pub const ERR_USER_NOT_ON_CHANNEL: Self = Self(26);
    /// Caller is already on the channel.
    pub const ERR_USER_ON_CHANNEL: Self = Self(27);
    /// Not enough parameters for the command.
    pub const ERR_NOT_ENOUGH_PARAMS: Self = Self(29);
    /// Operation requires channel operator privileges.
    pub const ERR_NO_CHANNEL_PRIV: Self = Self(39);

    /// Whether this status reports success (plain OK or a list marker).
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 <= Self::LIST_END.0
    }

    /// Whether this status is an error code.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 >= Self::ERR_NO_SUCH_NICK.0
    }

    /// Human-readable message for this status.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self.0 {
            0 => "Ok",
            1 => "List start",
            2 => "List item",
            3 => "List end",
            10 => "There was no such nickname",
            11 => "There was no such channel",
            12 => "There was no such server",
            13 => "Incomplete registration information",
            14 => "No recipient given",
            15 => "Unknown command",
            16 => "Wildcards not allowed",
            17 => "No Client ID given",
            18 => "No Channel ID given",
            19 => "No Server ID given",
            20 => "Bad Client ID",
            21 => "Bad Channel ID",
            22 => "There is no such client",
            23 => "There is no such channel",
            24 => "Nickname already exists",
            25 => "You are not on that channel",
            26 => "They are not on the channel",
            27 => "User already on the channel",
            28 => "You have not registered",
            29 => "Not enough parameters",
            30 => "Too many parameters",
            31 => "Permission denied",
            32 => "You are banned from this server",
            33 => "Cannot join channel. Incorrect password",
            34 => "Cannot join channel. Channel is full",
            35 => "Cannot join channel. You have not been invited",
            36 => "Cannot join channel. You have been banned",
            37 => "Unknown mode",
            38 => "Cannot change mode for other users",
            39 => "Permission denied. You are not channel operator",
            40 => "Permission denied. You are not channel founder",
            41 => "Permission denied. You are not server operator",
            42 => "Permission denied. You are not SILC operator",
            43 => "Bad nickname",
            44 => "Bad channel name",
            45 => "Authentication failed",
            46 => "Unsupported algorithm",
            47 => "No such Server ID",
            _ => "Unknown status",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

bitflags::bitflags! {
    /// Flags carried by channel and private messages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u32 {
        /// Automatic reply.
        const AUTOREPLY = 0x0001;
        /// Must not be replied to.
        const NOREPLY = 0x0002;
        /// An action (`/me`).
        const ACTION = 0x0004;
        /// A notice.
        const NOTICE = 0x0008;
        /// A request.
        const REQUEST = 0x0010;
        /// Signed by the sender.
        const SIGNED = 0x0020;
        /// A reply.
        const REPLY = 0x0040;
        /// Binary data.
        const DATA = 0x0080;
        /// UTF-8 text. Always set on outgoing messages.
        const UTF8 = 0x0100;
        /// Acknowledgement.
        const ACK = 0x0200;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_type_tags() {
        assert_eq!(IdType::from_ffi(2), Some(IdType::Client));
        assert_eq!(IdType::Channel.code(), 3);
        assert_eq!(IdType::from_ffi(0), None);
    }

    #[test]
    fn command_names_round_trip() {
        for command in Command::ALL {
            assert_eq!(Command::from_name(command.name()), Some(command));
            assert_eq!(Command::from_ffi(command.code()), Some(command));
        }
        assert_eq!(Command::from_name("join"), Some(Command::Join));
        assert_eq!(Command::from_name("frobnicate"), None);
    }

    #[test]
    fn status_classes() {
        assert!(Status::OK.is_ok());
        assert!(Status::LIST_END.is_ok());
        assert!(!Status::LIST_END.is_error());
        assert!(Status::ERR_NO_SUCH_NICK.is_error());
        assert!(!Status(5).is_ok());
        assert_eq!(Status::ERR_UNKNOWN_COMMAND.message(), "Unknown command");
        assert_eq!(Status(200).message(), "Unknown status");
    }

    #[test]
    fn connection_success_states() {
        assert!(ConnectionStatus::Success.is_success());
        assert!(ConnectionStatus::SuccessResume.is_success());
        assert!(!ConnectionStatus::Disconnected.is_success());
        assert!(!ConnectionStatus::ErrorTimeout.is_success());
    }
}
