#![doc = include_str!("../README.md")]

pub mod callbacks;
pub mod client;
pub mod entity;
pub mod error;
pub mod event;
pub mod keys;
pub mod native;
pub mod toolkit;
pub mod types;
pub mod value;

mod dispatch;

#[cfg(feature = "loopback")]
pub mod loopback;

// Re-export core public API at crate root.
pub use callbacks::{Callable, Callbacks, EventSlot, Slot};
pub use client::{Client, ClientBuilder, Session};
pub use dispatch::HandlerFailure;
pub use entity::{Channel, Projection, User};
pub use error::{Error, HandlerError, HandlerResult, Result};
pub use event::{
    Actor, ChannelListing, Event, Notification, PassphraseCompletion, PendingLookup, Reply,
};
pub use keys::{KeyPair, KeyPairParams, Keys, PrivateKey, PublicKey};
pub use native::{
    ChannelEntry, ChannelId, ClientEntry, ClientId, ConnectionEntry, Entry, EntryRef, Fingerprint,
    MemberList,
};
pub use toolkit::{Identity, KeyProvider, Toolkit};
pub use types::{
    Command, ConnectionStatus, IdType, MessageFlags, MessageType, NotifyType, Status,
};
pub use value::Value;
