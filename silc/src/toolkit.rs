//! The boundary with the native protocol toolkit.
//!
//! Everything protocol-related (transport, framing, key exchange, command
//! parsing) happens behind [`Toolkit`]. The bridge drives it through this
//! trait and receives its callbacks as typed [`Event`]s from
//! [`Toolkit::run_one`].

use std::path::Path;
use std::sync::Once;

use crate::error::Result;
use crate::event::{Event, PendingLookup};
use crate::keys::{KeyPair, KeyPairParams};
use crate::native::{ChannelEntry, ClientEntry, ConnectionEntry, Entry, MemberList};
use crate::types::MessageFlags;

/// Local identity presented to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Nickname.
    pub nickname: String,
    /// Login name.
    pub username: String,
    /// Real name.
    pub realname: String,
    /// Local host name.
    pub hostname: String,
}

/// A native client runtime.
///
/// The toolkit owns every [`Entry`] it hands out. Methods that operate on a
/// connection receive the live entry the toolkit reported on connect.
pub trait Toolkit {
    /// Process-wide algorithm registration. Called at most once per process.
    fn register_defaults(&self);

    /// Allocate and initialise the client with the given identity and keys.
    ///
    /// # Errors
    ///
    /// Fails if the runtime cannot be initialised.
    fn init(&mut self, identity: &Identity, keys: &KeyPair) -> Result<()>;

    /// Start connecting to a server. Completion arrives as
    /// [`Event::Connection`]. Returns the socket handle.
    ///
    /// # Errors
    ///
    /// Fails if the connection cannot be started.
    fn connect_to_server(&mut self, host: &str, port: u16) -> Result<i32>;

    /// Run one iteration of the runtime's I/O loop, returning the events
    /// produced, in order.
    fn run_one(&mut self) -> Vec<Event>;

    /// Send a message to a channel.
    ///
    /// # Errors
    ///
    /// Fails if the message cannot be queued.
    fn send_channel_message(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        channel: &Entry<ChannelEntry>,
        flags: MessageFlags,
        message: &[u8],
        force_send: bool,
    ) -> Result<()>;

    /// Send a private message to a user.
    ///
    /// # Errors
    ///
    /// Fails if the message cannot be queued.
    fn send_private_message(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        user: &Entry<ClientEntry>,
        flags: MessageFlags,
        message: &[u8],
        force_send: bool,
    ) -> Result<()>;

    /// Submit a command line such as `JOIN #lobby`.
    ///
    /// # Errors
    ///
    /// Fails if the line is not a command the runtime knows.
    fn command_call(&mut self, conn: &Entry<ConnectionEntry>, line: &str) -> Result<()>;

    /// Set the away message, or clear it with `None`.
    ///
    /// # Errors
    ///
    /// Fails if the runtime rejects the change.
    fn set_away_message(&mut self, conn: &Entry<ConnectionEntry>, message: Option<&str>)
    -> Result<()>;

    /// Resolve member identifiers into client entries.
    ///
    /// The runtime must eventually emit [`Event::ClientsResolved`] carrying
    /// `lookup` back, or drop it.
    fn resolve_clients(
        &mut self,
        conn: &Entry<ConnectionEntry>,
        members: &MemberList,
        lookup: PendingLookup,
    );

    /// Stop the runtime. Outstanding entries are released.
    fn stop(&mut self);
}

/// Creates and loads key pairs.
pub trait KeyProvider {
    /// Generate a pair and write it to the files named in `params`.
    ///
    /// # Errors
    ///
    /// Fails if generation or writing fails.
    fn create_key_pair(&self, params: &KeyPairParams) -> Result<KeyPair>;

    /// Load a pair from disk.
    ///
    /// # Errors
    ///
    /// Fails if the files cannot be read or decrypted.
    fn load_key_pair(
        &self,
        public_path: &Path,
        private_path: &Path,
        passphrase: Option<&str>,
    ) -> Result<KeyPair>;
}

static REGISTER: Once = Once::new();

/// Run the toolkit's one-time registration if no client has done so yet.
pub(crate) fn ensure_registered(toolkit: &dyn Toolkit) {
    REGISTER.call_once(|| {
        toolkit.register_defaults();
        tracing::debug!("toolkit algorithms registered");
    });
}
