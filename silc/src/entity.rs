//! User and channel wrappers, and the identity map that hands them out.
//!
//! A wrapper proxies a toolkit-owned record through a non-owning
//! [`EntryRef`]. The fixed attributes are projected from the record on every
//! read; any other attribute name is stored on the wrapper itself. Once the
//! record is released, or the wrapper is [cleared](Wrapper::clear), every
//! fixed attribute reads as [`Value::None`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::native::{ChannelEntry, ClientEntry, Entry, EntryRef};
use crate::value::Value;

/// Field projection for a native record kind.
pub trait Projection: Send + Sync + 'static {
    /// Kind name used in diagnostics.
    const KIND: &'static str;

    /// Names of the fixed, read-only attributes.
    const FIELDS: &'static [&'static str];

    /// Project one fixed field. Unknown names yield [`Value::None`].
    fn project(&self, field: &str) -> Value;

    /// The name used for ordering and display.
    fn name(&self) -> &str;

    /// Human-readable rendering.
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl Projection for ClientEntry {
    const KIND: &'static str = "user";
    const FIELDS: &'static [&'static str] = &[
        "nickname",
        "username",
        "hostname",
        "server",
        "realname",
        "fingerprint",
        "user_id",
        "mode",
        "status",
    ];

    fn project(&self, field: &str) -> Value {
        match field {
            "nickname" => self.nickname.as_str().into(),
            "username" => self.username.as_str().into(),
            "hostname" => self.hostname.as_str().into(),
            "server" => self.server.as_str().into(),
            "realname" => self.realname.as_deref().into(),
            "fingerprint" => self.fingerprint.map(|fp| fp.0.to_vec()).into(),
            "user_id" => self.id.0.to_vec().into(),
            "mode" => self.mode.into(),
            "status" => self.status.into(),
            _ => Value::None,
        }
    }

    fn name(&self) -> &str {
        &self.nickname
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}@{}> on {}",
            self.nickname, self.username, self.hostname, self.server
        )
    }
}

impl Projection for ChannelEntry {
    const KIND: &'static str = "channel";
    const FIELDS: &'static [&'static str] =
        &["channel_name", "channel_id", "mode", "topic", "user_limit"];

    fn project(&self, field: &str) -> Value {
        match field {
            "channel_name" => self.channel_name.as_str().into(),
            "channel_id" => self.id.0.to_vec().into(),
            "mode" => self.mode.into(),
            "topic" => self.topic.as_deref().into(),
            "user_limit" => self.user_limit.into(),
            _ => Value::None,
        }
    }

    fn name(&self) -> &str {
        &self.channel_name
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel_name)
    }
}

struct Inner<E> {
    entry: RwLock<EntryRef<E>>,
    attrs: RwLock<HashMap<String, Value>>,
}

/// Handle to a toolkit-owned record. Clones share identity.
pub struct Wrapper<E: Projection> {
    inner: Arc<Inner<E>>,
}

/// A wrapped user.
pub type User = Wrapper<ClientEntry>;

/// A wrapped channel.
pub type Channel = Wrapper<ChannelEntry>;

impl<E: Projection> Wrapper<E> {
    pub(crate) fn new(entry: EntryRef<E>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entry: RwLock::new(entry),
                attrs: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Read an attribute.
    ///
    /// Fixed attributes always return `Some`, holding [`Value::None`] when
    /// the record is gone. Other names return whatever was stored with
    /// [`set_attr`](Self::set_attr), or `None` if nothing was.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<Value> {
        if E::FIELDS.contains(&name) {
            return Some(
                self.entry()
                    .map_or(Value::None, |entry| entry.read().project(name)),
            );
        }
        self.inner.attrs.read().get(name).cloned()
    }

    /// Store a dynamic attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadOnlyAttribute`] for any fixed attribute name.
    pub fn set_attr(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        if E::FIELDS.contains(&name) {
            return Err(Error::ReadOnlyAttribute(name.to_owned()));
        }
        self.inner.attrs.write().insert(name.to_owned(), value.into());
        Ok(())
    }

    /// Remove a dynamic attribute, returning its value.
    pub fn remove_attr(&self, name: &str) -> Option<Value> {
        self.inner.attrs.write().remove(name)
    }

    /// Detach from the native record. Fixed attributes read as none afterwards.
    pub fn clear(&self) {
        *self.inner.entry.write() = EntryRef::dangling();
    }

    /// Whether the native record is still reachable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.entry.read().is_live()
    }

    /// The record's name (nickname or channel name), if still reachable.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.entry().map(|entry| entry.read().name().to_owned())
    }

    /// Order by name. Wrappers whose record is gone sort first.
    #[must_use]
    pub fn cmp_name(&self, other: &Self) -> Ordering {
        self.name().cmp(&other.name())
    }

    /// Resolve the native record.
    pub(crate) fn entry(&self) -> Option<Entry<E>> {
        self.inner.entry.read().upgrade()
    }

    /// Resolve the native record, failing for a cleared wrapper.
    pub(crate) fn live_entry(&self) -> Result<Entry<E>> {
        self.entry().ok_or(Error::StaleEntity(E::KIND))
    }

    fn refers_to(&self, entry: &EntryRef<E>) -> bool {
        let current = self.inner.entry.read();
        current.is_live() && current.ptr_eq(entry)
    }

    fn downgrade(&self) -> Weak<Inner<E>> {
        Arc::downgrade(&self.inner)
    }
}

impl<E: Projection> Clone for Wrapper<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Projection> PartialEq for Wrapper<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E: Projection> Eq for Wrapper<E> {}

impl<E: Projection> Hash for Wrapper<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl<E: Projection> fmt::Display for Wrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry() {
            Some(entry) => entry.read().describe(f),
            None => write!(f, "<{} (cleared)>", E::KIND),
        }
    }
}

impl<E: Projection> fmt::Debug for Wrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(E::KIND)
            .field("name", &self.name())
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// Cache of live wrappers for one record kind, keyed by record address.
struct WrapperCache<E> {
    map: HashMap<usize, Weak<Inner<E>>>,
}

impl<E: Projection> WrapperCache<E> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    fn wrap(&mut self, entry: &EntryRef<E>) -> Option<Wrapper<E>> {
        if !entry.is_live() {
            return None;
        }
        let key = entry.addr();
        if let Some(inner) = self.map.get(&key).and_then(Weak::upgrade) {
            let existing = Wrapper { inner };
            if existing.refers_to(entry) {
                return Some(existing);
            }
        }
        let wrapper = Wrapper::new(entry.clone());
        self.map.insert(key, wrapper.downgrade());
        Some(wrapper)
    }

    fn invalidate_all(&mut self) {
        for inner in self.map.drain().filter_map(|(_, weak)| weak.upgrade()) {
            Wrapper { inner }.clear();
        }
    }

    fn prune(&mut self) {
        self.map.retain(|_, weak| {
            weak.upgrade()
                .is_some_and(|inner| inner.entry.read().is_live())
        });
    }
}

/// Maps native record addresses to the wrappers already handed out for them.
///
/// Repeated sightings of a live record return the same wrapper. Wrappers are
/// held weakly, so the host decides how long they live.
pub(crate) struct IdentityMap {
    users: WrapperCache<ClientEntry>,
    channels: WrapperCache<ChannelEntry>,
}

impl IdentityMap {
    const PRUNE_THRESHOLD: usize = 256;

    pub(crate) fn new() -> Self {
        Self {
            users: WrapperCache::new(),
            channels: WrapperCache::new(),
        }
    }

    /// Wrapper for a user record, or `None` if the record is gone.
    pub(crate) fn wrap_user(&mut self, entry: &EntryRef<ClientEntry>) -> Option<User> {
        self.users.wrap(entry)
    }

    /// Wrapper for a channel record, or `None` if the record is gone.
    pub(crate) fn wrap_channel(&mut self, entry: &EntryRef<ChannelEntry>) -> Option<Channel> {
        self.channels.wrap(entry)
    }

    /// Clear every live wrapper and forget them all.
    pub(crate) fn invalidate_all(&mut self) {
        self.users.invalidate_all();
        self.channels.invalidate_all();
    }

    /// Drop map slots whose wrapper or record has died.
    pub(crate) fn prune(&mut self) {
        if self.len() >= Self::PRUNE_THRESHOLD {
            self.users.prune();
            self.channels.prune();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.users.map.len() + self.channels.map.len()
    }
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("users", &self.users.map.len())
            .field("channels", &self.channels.map.len())
            .finish()
    }
}
