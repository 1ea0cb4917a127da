//! SILC client: the entry point of the bridge.

mod session;

pub use session::Session;

use std::fmt;

use crate::callbacks::{Callbacks, EventSlot, Slot};
use crate::dispatch::{Dispatch, FailureQueue, HandlerFailure};
use crate::entity::{Channel, User};
use crate::error::{Error, HandlerResult, Result};
use crate::keys::Keys;
use crate::toolkit::{Identity, Toolkit, ensure_registered};
use crate::types::MessageFlags;
use crate::value::Value;

/// A client bound to one toolkit instance and one key pair.
///
/// Drive it by calling [`run_one`](Self::run_one) from the host's loop; every
/// event ready at that moment is dispatched to the registered handlers before
/// it returns.
pub struct Client {
    session: Session,
    callbacks: Callbacks,
    failures: FailureQueue,
}

impl Client {
    /// Create a new [`ClientBuilder`].
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Pump the toolkit once and dispatch every event it produced, in order.
    /// Returns the number of events seen.
    pub fn run_one(&mut self) -> usize {
        let events = self.session.toolkit_mut().run_one();
        let count = events.len();
        let mut dispatch = Dispatch {
            session: &mut self.session,
            callbacks: &mut self.callbacks,
            failures: &mut self.failures,
        };
        for event in events {
            dispatch.event(event);
        }
        self.session.identities.prune();
        count
    }

    /// Install a handler closure in `slot`, replacing what was there.
    pub fn set_handler<F>(&mut self, slot: EventSlot, handler: F)
    where
        F: FnMut(&mut Session, &[Value]) -> HandlerResult + 'static,
    {
        self.callbacks.set(slot, Slot::handler(handler));
    }

    /// Replace the contents of `slot`, returning the previous contents.
    pub fn set_slot(&mut self, slot: EventSlot, value: Slot) -> Slot {
        self.callbacks.set(slot, value)
    }

    /// Empty `slot`, returning the previous contents.
    pub fn clear_slot(&mut self, slot: EventSlot) -> Slot {
        self.callbacks.clear(slot)
    }

    /// Inspect `slot`.
    #[must_use]
    pub fn slot(&self, slot: EventSlot) -> &Slot {
        self.callbacks.get(slot)
    }

    /// Drain the handler failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<HandlerFailure> {
        self.failures.drain()
    }

    /// The session handlers operate on.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the session.
    pub const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// See [`Session::connect_to_server`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Toolkit`] if the connection cannot be started.
    pub fn connect_to_server(&mut self, host: &str, port: Option<u16>) -> Result<i32> {
        self.session.connect_to_server(host, port)
    }

    /// See [`Session::send_channel_message`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or [`Error::StaleEntity`].
    pub fn send_channel_message(
        &mut self,
        channel: &Channel,
        message: &str,
        flags: MessageFlags,
        force_send: bool,
    ) -> Result<()> {
        self.session
            .send_channel_message(channel, message, flags, force_send)
    }

    /// See [`Session::send_private_message`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or [`Error::StaleEntity`].
    pub fn send_private_message(
        &mut self,
        user: &User,
        message: &str,
        flags: MessageFlags,
        force_send: bool,
    ) -> Result<()> {
        self.session
            .send_private_message(user, message, flags, force_send)
    }

    /// See [`Session::command_call`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or the toolkit's rejection.
    pub fn command_call(&mut self, line: &str) -> Result<()> {
        self.session.command_call(line)
    }

    /// See [`Session::set_away_message`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`].
    pub fn set_away_message(&mut self, message: Option<&str>) -> Result<()> {
        self.session.set_away_message(message)
    }

    /// See [`Session::remote_host`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`].
    pub fn remote_host(&self) -> Result<String> {
        self.session.remote_host()
    }

    /// See [`Session::user`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`].
    pub fn user(&mut self) -> Result<Option<User>> {
        self.session.user()
    }

    /// The key pair this client was built with.
    #[must_use]
    pub const fn keys(&self) -> &Keys {
        self.session.keys()
    }

    /// Whether a connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session.toolkit_mut().stop();
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`]. Identity fields left unset are taken from the
/// local system.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    nickname: Option<String>,
    username: Option<String>,
    realname: Option<String>,
    hostname: Option<String>,
}

impl ClientBuilder {
    /// Set the nickname (default: the user name).
    #[must_use]
    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Set the user name (default: the local login name).
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the real name (default: the local account's full name).
    #[must_use]
    pub fn realname(mut self, realname: impl Into<String>) -> Self {
        self.realname = Some(realname.into());
        self
    }

    /// Set the host name (default: the local host name).
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Resolve the identity, filling unset fields from the local system.
    #[must_use]
    pub fn identity(&self) -> Identity {
        let username = self
            .username
            .clone()
            .unwrap_or_else(|| system_or(whoami::fallible::username(), || "guest".to_owned()));
        let realname = self
            .realname
            .clone()
            .unwrap_or_else(|| system_or(whoami::fallible::realname(), || username.clone()));
        let hostname = self
            .hostname
            .clone()
            .unwrap_or_else(|| system_or(whoami::fallible::hostname(), || "localhost".to_owned()));
        Identity {
            nickname: self.nickname.clone().unwrap_or_else(|| username.clone()),
            username,
            realname,
            hostname,
        }
    }

    /// Initialise `toolkit` with this identity and `keys`, and wrap it in a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Init`] if the toolkit refuses to initialise.
    pub fn build(self, toolkit: impl Toolkit + 'static, keys: Keys) -> Result<Client> {
        let mut toolkit: Box<dyn Toolkit> = Box::new(toolkit);
        ensure_registered(toolkit.as_ref());
        let identity = self.identity();
        toolkit.init(&identity, keys.pair()).map_err(|e| match e {
            Error::Init(_) => e,
            other => Error::Init(other.to_string()),
        })?;
        tracing::debug!(nickname = %identity.nickname, "client initialised");
        Ok(Client {
            session: Session::new(toolkit, identity, keys),
            callbacks: Callbacks::new(),
            failures: FailureQueue::new(),
        })
    }
}

/// A value read from the local system, or `fallback` if it is missing or empty.
fn system_or<E>(
    value: std::result::Result<String, E>,
    fallback: impl FnOnce() -> String,
) -> String {
    value
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_system_values_fall_back() {
        assert_eq!(system_or(Ok::<_, ()>("Ada".into()), || "x".into()), "Ada");
        assert_eq!(system_or(Ok::<_, ()>(String::new()), || "guest".into()), "guest");
        assert_eq!(system_or(Ok::<_, ()>("  ".into()), || "guest".into()), "guest");
        assert_eq!(system_or(Err(()), || "localhost".into()), "localhost");
    }

    #[test]
    fn realname_defaults_to_the_username() {
        let identity = Client::builder().username("zed").identity();
        assert!(!identity.realname.is_empty());
        assert_eq!(identity.nickname, "zed");
    }
}
