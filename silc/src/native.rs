//! Native records owned by the toolkit, and the shared cells that hold them.
//!
//! The toolkit owns every [`Entry`]. Events and wrappers only ever carry an
//! [`EntryRef`], which cannot keep the record alive and cannot be read once
//! the toolkit has released it.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Owning handle to a native record. Held by the toolkit.
pub struct Entry<T>(Arc<RwLock<T>>);

impl<T> Entry<T> {
    /// Allocate a new record.
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// A non-owning reference to this record.
    #[must_use]
    pub fn downgrade(&self) -> EntryRef<T> {
        EntryRef(Arc::downgrade(&self.0))
    }

    /// Shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    /// Exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Stable address of the record, used as its identity.
    #[must_use]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Entry").field(&*self.0.read()).finish()
    }
}

/// Non-owning reference to a native record.
pub struct EntryRef<T>(Weak<RwLock<T>>);

impl<T> EntryRef<T> {
    /// A reference that never resolves.
    #[must_use]
    pub const fn dangling() -> Self {
        Self(Weak::new())
    }

    /// Resolve to the record, or `None` once the toolkit has released it.
    #[must_use]
    pub fn upgrade(&self) -> Option<Entry<T>> {
        self.0.upgrade().map(Entry)
    }

    /// Whether the record is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Address of the referenced record. Stays stable while this reference exists.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Whether both references point at the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for EntryRef<T> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<T> fmt::Debug for EntryRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("live", &self.is_live())
            .finish()
    }
}

macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width of the identifier in bytes.
            pub const LEN: usize = $len;

            /// Raw identifier bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0; $len])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }
    };
}

fixed_id! {
    /// 224-bit client identifier.
    ClientId, 28
}

fixed_id! {
    /// 160-bit channel identifier.
    ChannelId, 20
}

fixed_id! {
    /// SHA-1 public key fingerprint.
    Fingerprint, 20
}

/// A client (user) record.
#[derive(Debug, Clone, Default)]
pub struct ClientEntry {
    /// Current nickname.
    pub nickname: String,
    /// Login name.
    pub username: String,
    /// Host the user connects from.
    pub hostname: String,
    /// Server the user is attached to.
    pub server: String,
    /// Real name, if known.
    pub realname: Option<String>,
    /// Public key fingerprint, if resolved.
    pub fingerprint: Option<Fingerprint>,
    /// Network-wide identifier.
    pub id: ClientId,
    /// User mode bits.
    pub mode: u32,
    /// Toolkit status bits.
    pub status: u32,
}

/// A channel record.
#[derive(Debug, Clone, Default)]
pub struct ChannelEntry {
    /// Channel name.
    pub channel_name: String,
    /// Current topic.
    pub topic: Option<String>,
    /// Network-wide identifier.
    pub id: ChannelId,
    /// Channel mode bits.
    pub mode: u32,
    /// Maximum number of members, 0 for none.
    pub user_limit: u32,
}

/// An established server connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    /// Server host name as given to connect.
    pub remote_host: String,
    /// Server port.
    pub port: u16,
    /// Our own client record on this connection.
    pub local_entry: EntryRef<ClientEntry>,
}

/// Unresolved member identifiers delivered by a join reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberList(pub Vec<ClientId>);

impl MemberList {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the identifiers.
    pub fn iter(&self) -> std::slice::Iter<'_, ClientId> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_ref_dies_with_entry() {
        let entry = Entry::new(ChannelEntry::default());
        let weak = entry.downgrade();
        assert!(weak.is_live());
        assert_eq!(weak.addr(), entry.addr());
        drop(entry);
        assert!(!weak.is_live());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn ids_display_as_hex() {
        let mut raw = [0u8; 20];
        raw[0] = 0xab;
        raw[19] = 0x01;
        let id = ChannelId(raw);
        let text = id.to_string();
        assert_eq!(text.len(), 40);
        assert!(text.starts_with("ab"));
        assert!(text.ends_with("01"));
        assert_eq!(ClientId::LEN, 28);
    }

    #[test]
    fn dangling_never_resolves() {
        let r = EntryRef::<ClientEntry>::dangling();
        assert!(r.upgrade().is_none());
    }
}
