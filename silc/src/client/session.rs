//! The connection-facing half of a client, as seen from handlers.

use std::fmt;

use crate::entity::{Channel, IdentityMap, User};
use crate::error::{Error, Result};
use crate::keys::Keys;
use crate::native::{ConnectionEntry, Entry, EntryRef};
use crate::toolkit::{Identity, Toolkit};
use crate::types::MessageFlags;

/// Toolkit handle, identity, keys and connection state of one client.
///
/// Handlers receive `&mut Session`, so they can reply, run commands and
/// inspect the connection from inside a callback.
pub struct Session {
    toolkit: Box<dyn Toolkit>,
    identity: Identity,
    keys: Keys,
    connection: Option<EntryRef<ConnectionEntry>>,
    epoch: u64,
    pub(crate) identities: IdentityMap,
}

impl Session {
    /// Port used when none is given to [`connect_to_server`](Self::connect_to_server).
    pub const DEFAULT_PORT: u16 = 706;

    pub(crate) fn new(toolkit: Box<dyn Toolkit>, identity: Identity, keys: Keys) -> Self {
        Self {
            toolkit,
            identity,
            keys,
            connection: None,
            epoch: 0,
            identities: IdentityMap::new(),
        }
    }

    /// Start connecting to `host`. Completion is reported to the `connected`
    /// or `failure` handler. Returns the toolkit's socket handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toolkit`] if the connection cannot be started.
    pub fn connect_to_server(&mut self, host: &str, port: Option<u16>) -> Result<i32> {
        let port = port.unwrap_or(Self::DEFAULT_PORT);
        let socket = self.toolkit.connect_to_server(host, port)?;
        tracing::info!(host, port, socket, "connecting");
        Ok(socket)
    }

    /// Send a message to a channel. [`MessageFlags::UTF8`] is always added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connection and
    /// [`Error::StaleEntity`] if the channel wrapper has been cleared.
    pub fn send_channel_message(
        &mut self,
        channel: &Channel,
        message: &str,
        flags: MessageFlags,
        force_send: bool,
    ) -> Result<()> {
        let conn = self.connection()?;
        let channel = channel.live_entry()?;
        self.toolkit.send_channel_message(
            &conn,
            &channel,
            flags | MessageFlags::UTF8,
            message.as_bytes(),
            force_send,
        )
    }

    /// Send a private message to a user. [`MessageFlags::UTF8`] is always added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connection and
    /// [`Error::StaleEntity`] if the user wrapper has been cleared.
    pub fn send_private_message(
        &mut self,
        user: &User,
        message: &str,
        flags: MessageFlags,
        force_send: bool,
    ) -> Result<()> {
        let conn = self.connection()?;
        let user = user.live_entry()?;
        self.toolkit.send_private_message(
            &conn,
            &user,
            flags | MessageFlags::UTF8,
            message.as_bytes(),
            force_send,
        )
    }

    /// Submit a command line, e.g. `JOIN #lobby`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connection, or the toolkit's
    /// error if it rejects the line.
    pub fn command_call(&mut self, line: &str) -> Result<()> {
        let conn = self.connection()?;
        self.toolkit.command_call(&conn, line)
    }

    /// Set the away message. `None` or an empty string clears it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connection.
    pub fn set_away_message(&mut self, message: Option<&str>) -> Result<()> {
        let conn = self.connection()?;
        let message = message.filter(|m| !m.is_empty());
        self.toolkit.set_away_message(&conn, message)
    }

    /// Host name of the connected server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connection.
    pub fn remote_host(&self) -> Result<String> {
        Ok(self.connection()?.read().remote_host.clone())
    }

    /// Our own user on the current connection, `None` if the toolkit has not
    /// registered it yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a connection.
    pub fn user(&mut self) -> Result<Option<User>> {
        let conn = self.connection()?;
        let local = conn.read().local_entry.clone();
        Ok(self.identities.wrap_user(&local))
    }

    /// The key pair this client was built with.
    #[must_use]
    pub const fn keys(&self) -> &Keys {
        &self.keys
    }

    /// The identity presented to servers.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether a connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(EntryRef::is_live)
    }

    pub(crate) fn connection(&self) -> Result<Entry<ConnectionEntry>> {
        self.connection
            .as_ref()
            .and_then(EntryRef::upgrade)
            .ok_or(Error::NotConnected)
    }

    /// Adopt a new connection. Replacing an earlier one clears it first, as
    /// a disconnect would.
    pub(crate) fn set_connection(&mut self, connection: EntryRef<ConnectionEntry>) {
        if self.connection.is_some() {
            self.clear_connection();
        }
        self.connection = Some(connection);
    }

    /// Forget the connection. Every wrapper handed out so far is cleared and
    /// lookups started on the old connection are abandoned.
    pub(crate) fn clear_connection(&mut self) {
        self.connection = None;
        self.epoch += 1;
        self.identities.invalidate_all();
    }

    pub(crate) const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn toolkit_mut(&mut self) -> &mut dyn Toolkit {
        self.toolkit.as_mut()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .field("epoch", &self.epoch)
            .field("identities", &self.identities)
            .finish_non_exhaustive()
    }
}
