//! Per-client handler slots.

use std::fmt;
use std::str::FromStr;

use crate::client::Session;
use crate::error::{Error, HandlerResult};
use crate::value::Value;

macro_rules! event_slots {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Named handler slot, one per event kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventSlot {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl EventSlot {
            /// Every slot, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// The slot's name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        impl FromStr for EventSlot {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)*
                    other => Err(Error::InvalidArgument(format!("unknown event slot `{other}`"))),
                }
            }
        }
    };
}

event_slots! {
    Say => "say",
    ChannelMessage => "channel_message",
    PrivateMessage => "private_message",
    Command => "command",
    Connected => "connected",
    Disconnected => "disconnected",
    Failure => "failure",
    Detach => "detach",

    NotifyNone => "notify_none",
    NotifyInvite => "notify_invite",
    NotifyJoin => "notify_join",
    NotifyLeave => "notify_leave",
    NotifySignoff => "notify_signoff",
    NotifyTopicSet => "notify_topic_set",
    NotifyNickChange => "notify_nick_change",
    NotifyCmodeChange => "notify_cmode_change",
    NotifyCumodeChange => "notify_cumode_change",
    NotifyMotd => "notify_motd",
    NotifyChannelChange => "notify_channel_change",
    NotifyServerSignoff => "notify_server_signoff",
    NotifyKicked => "notify_kicked",
    NotifyKilled => "notify_killed",
    NotifyError => "notify_error",
    NotifyWatch => "notify_watch",

    CommandReplyWhois => "command_reply_whois",
    CommandReplyWhowas => "command_reply_whowas",
    CommandReplyIdentify => "command_reply_identify",
    CommandReplyNick => "command_reply_nick",
    CommandReplyList => "command_reply_list",
    CommandReplyTopic => "command_reply_topic",
    CommandReplyInvite => "command_reply_invite",
    CommandReplyKill => "command_reply_kill",
    CommandReplyInfo => "command_reply_info",
    CommandReplyStats => "command_reply_stats",
    CommandReplyPing => "command_reply_ping",
    CommandReplyOper => "command_reply_oper",
    CommandReplyJoin => "command_reply_join",
    CommandReplyMotd => "command_reply_motd",
    CommandReplyCmode => "command_reply_cmode",
    CommandReplyCumode => "command_reply_cumode",
    CommandReplyKick => "command_reply_kick",
    CommandReplyBan => "command_reply_ban",
    CommandReplyDetach => "command_reply_detach",
    CommandReplyWatch => "command_reply_watch",
    CommandReplySilcoper => "command_reply_silcoper",
    CommandReplyLeave => "command_reply_leave",
    CommandReplyUsers => "command_reply_users",
    CommandReplyService => "command_reply_service",

    CommandReplyFailed => "command_reply_failed",

    AskPassphrase => "ask_passphrase",
}

impl fmt::Display for EventSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that can handle an event.
pub trait Callable {
    /// Handle one event with its positional arguments.
    ///
    /// # Errors
    ///
    /// Any error is reported through the client's failure queue.
    fn call(&mut self, session: &mut Session, args: &[Value]) -> HandlerResult;

    /// Handle one event and produce an answer for the toolkit.
    ///
    /// Plain handlers answer [`Value::None`].
    ///
    /// # Errors
    ///
    /// Any error is reported through the client's failure queue.
    fn respond(&mut self, session: &mut Session, args: &[Value]) -> HandlerResult<Value> {
        self.call(session, args).map(|()| Value::None)
    }
}

impl<F> Callable for F
where
    F: FnMut(&mut Session, &[Value]) -> HandlerResult,
{
    fn call(&mut self, session: &mut Session, args: &[Value]) -> HandlerResult {
        self(session, args)
    }
}

/// A handler whose return value is passed back to the toolkit.
struct Responder<F>(F);

impl<F> Callable for Responder<F>
where
    F: FnMut(&mut Session, &[Value]) -> HandlerResult<Value>,
{
    fn call(&mut self, session: &mut Session, args: &[Value]) -> HandlerResult {
        self.respond(session, args).map(drop)
    }

    fn respond(&mut self, session: &mut Session, args: &[Value]) -> HandlerResult<Value> {
        (self.0)(session, args)
    }
}

/// Contents of a handler slot.
#[derive(Default)]
pub enum Slot {
    /// Nothing assigned. Events are ignored.
    #[default]
    Empty,
    /// A handler.
    Handler(Box<dyn Callable>),
    /// A non-callable value. Accepted, but events for the slot are dropped.
    Value(Value),
}

impl Slot {
    /// Box a closure as a handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnMut(&mut Session, &[Value]) -> HandlerResult + 'static,
    {
        Self::Handler(Box::new(f))
    }

    /// Box a closure whose return value answers the event, as for
    /// [`EventSlot::AskPassphrase`].
    pub fn responder<F>(f: F) -> Self
    where
        F: FnMut(&mut Session, &[Value]) -> HandlerResult<Value> + 'static,
    {
        Self::Handler(Box::new(Responder(f)))
    }

    /// Whether dispatch would invoke this slot.
    #[must_use]
    pub const fn is_callable(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// The full table of handler slots for one client.
pub struct Callbacks {
    slots: Vec<Slot>,
}

impl Callbacks {
    /// A table with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: EventSlot::ALL.iter().map(|_| Slot::Empty).collect(),
        }
    }

    /// Replace a slot, returning what it held.
    pub fn set(&mut self, slot: EventSlot, value: Slot) -> Slot {
        std::mem::replace(&mut self.slots[slot as usize], value)
    }

    /// Empty a slot, returning what it held.
    pub fn clear(&mut self, slot: EventSlot) -> Slot {
        self.set(slot, Slot::Empty)
    }

    /// Inspect a slot.
    #[must_use]
    pub fn get(&self, slot: EventSlot) -> &Slot {
        &self.slots[slot as usize]
    }

    /// Whether the slot holds a handler.
    #[must_use]
    pub fn is_callable(&self, slot: EventSlot) -> bool {
        self.get(slot).is_callable()
    }

    pub(crate) fn handler_mut(&mut self, slot: EventSlot) -> Option<&mut dyn Callable> {
        match &mut self.slots[slot as usize] {
            Slot::Handler(handler) => Some(handler.as_mut()),
            Slot::Empty | Slot::Value(_) => None,
        }
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                EventSlot::ALL
                    .iter()
                    .filter(|s| !matches!(self.get(**s), Slot::Empty))
                    .map(|s| (s.name(), self.get(*s))),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_table_is_complete() {
        assert_eq!(EventSlot::ALL.len(), 50);
        let notify = EventSlot::ALL
            .iter()
            .filter(|s| s.name().starts_with("notify_"))
            .count();
        let replies = EventSlot::ALL
            .iter()
            .filter(|s| s.name().starts_with("command_reply_"))
            .count();
        assert_eq!(notify, 16);
        assert_eq!(replies, 25);
        for (i, slot) in EventSlot::ALL.iter().enumerate() {
            assert_eq!(*slot as usize, i);
        }
    }

    #[test]
    fn slots_parse_by_name() {
        for slot in EventSlot::ALL {
            assert_eq!(slot.name().parse::<EventSlot>().unwrap(), *slot);
        }
        assert!("notify_umode_change".parse::<EventSlot>().is_err());
    }

    #[test]
    fn set_and_clear() {
        let mut callbacks = Callbacks::new();
        assert!(!callbacks.is_callable(EventSlot::Connected));

        callbacks.set(EventSlot::Connected, Slot::handler(|_, _| Ok(())));
        assert!(callbacks.is_callable(EventSlot::Connected));
        assert!(callbacks.handler_mut(EventSlot::Connected).is_some());

        let old = callbacks.set(EventSlot::Connected, Slot::Value(Value::Int(3)));
        assert!(old.is_callable());
        assert!(!callbacks.is_callable(EventSlot::Connected));
        assert!(callbacks.handler_mut(EventSlot::Connected).is_none());

        assert!(matches!(callbacks.clear(EventSlot::Connected), Slot::Value(Value::Int(3))));
        assert!(matches!(callbacks.get(EventSlot::Connected), Slot::Empty));

        callbacks.set(
            EventSlot::AskPassphrase,
            Slot::responder(|_, _| Ok(Value::from("secret"))),
        );
        assert!(callbacks.is_callable(EventSlot::AskPassphrase));
    }
}
