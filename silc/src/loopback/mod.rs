//! In-process toolkit for tests and demos.
//!
//! [`LoopbackToolkit`] implements [`Toolkit`] without any network I/O. The
//! server side is simulated by a [`Network`], which a host scripts to make
//! remote users join channels, talk and sign off, and inspects to see what
//! the client sent.
//!
//! ```no_run
//! use silc::loopback::{FileKeyProvider, LoopbackToolkit, Network};
//! use silc::{Client, EventSlot, KeyPairParams, Keys};
//!
//! # fn main() -> silc::Result<()> {
//! let keys = Keys::create(&FileKeyProvider, &KeyPairParams::new("me.pub", "me.prv"))?;
//! let network = Network::new();
//! let mut client = Client::builder()
//!     .nickname("alice")
//!     .build(LoopbackToolkit::new(network.clone()), keys)?;
//! client.set_handler(EventSlot::Connected, |session, _| {
//!     session.command_call("JOIN #lobby")?;
//!     Ok(())
//! });
//! client.connect_to_server("silc.example.org", None)?;
//! client.run_one();
//! # Ok(())
//! # }
//! ```

mod keyfile;
mod network;

pub use keyfile::FileKeyProvider;
pub use network::{Network, SentMessage, Target};

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::event::{Event, PendingLookup};
use crate::keys::KeyPair;
use crate::native::{ChannelEntry, ClientEntry, ConnectionEntry, Entry, MemberList};
use crate::toolkit::{Identity, Toolkit};
use crate::types::MessageFlags;

static REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);

/// How many times [`Toolkit::register_defaults`] has run in this process.
#[must_use]
pub fn registrations() -> usize {
    REGISTRATIONS.load(Ordering::SeqCst)
}

/// A [`Toolkit`] backed by a [`Network`].
#[derive(Debug)]
pub struct LoopbackToolkit {
    network: Network,
    initialised: bool,
}

impl LoopbackToolkit {
    /// A toolkit attached to `network`.
    #[must_use]
    pub const fn new(network: Network) -> Self {
        Self {
            network,
            initialised: false,
        }
    }

    /// The network this toolkit talks to.
    #[must_use]
    pub const fn network(&self) -> &Network {
        &self.network
    }
}

impl Toolkit for LoopbackToolkit {
    fn register_defaults(&self) {
        REGISTRATIONS.fetch_add(1, Ordering::SeqCst);
    }

    fn init(&mut self, identity: &Identity, keys: &KeyPair) -> Result<()> {
        if keys.public_key.0.is_empty() {
            return Err(Error::Init("empty public key".into()));
        }
        if identity.nickname.is_empty() {
            return Err(Error::Init("empty nickname".into()));
        }
        self.network.state.lock().set_identity(identity.clone());
        self.initialised = true;
        Ok(())
    }

    fn connect_to_server(&mut self, host: &str, port: u16) -> Result<i32> {
        if !self.initialised {
            return Err(Error::Toolkit("client not initialised".into()));
        }
        self.network.state.lock().connect(host, port)
    }

    fn run_one(&mut self) -> Vec<Event> {
        let events = self.network.state.lock().pump();
        if !events.is_empty() {
            tracing::trace!(count = events.len(), "loopback events");
        }
        events
    }

    fn send_channel_message(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        channel: &Entry<ChannelEntry>,
        flags: MessageFlags,
        message: &[u8],
        force_send: bool,
    ) -> Result<()> {
        let mut state = self.network.state.lock();
        state.check_connection(conn)?;
        let target = Target::Channel(channel.read().channel_name.clone());
        state.record(target, flags, message, force_send);
        Ok(())
    }

    fn send_private_message(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        user: &Entry<ClientEntry>,
        flags: MessageFlags,
        message: &[u8],
        force_send: bool,
    ) -> Result<()> {
        let mut state = self.network.state.lock();
        state.check_connection(conn)?;
        let target = Target::User(user.read().nickname.clone());
        state.record(target, flags, message, force_send);
        Ok(())
    }

    fn command_call(&mut self, conn: &Entry<ConnectionEntry>, line: &str) -> Result<()> {
        let mut state = self.network.state.lock();
        state.check_connection(conn)?;
        state.command(line)
    }

    fn set_away_message(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        message: Option<&str>,
    ) -> Result<()> {
        let mut state = self.network.state.lock();
        state.check_connection(conn)?;
        state.set_away(message);
        Ok(())
    }

    fn resolve_clients(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        members: &MemberList,
        lookup: PendingLookup,
    ) {
        let mut state = self.network.state.lock();
        if state.check_connection(conn).is_err() {
            tracing::debug!("member lookup on a stale connection dropped");
            return;
        }
        state.resolve(members, lookup);
    }

    fn stop(&mut self) {
        self.network.state.lock().stop();
        self.initialised = false;
    }
}
