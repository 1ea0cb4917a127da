//! Key pairs handed to the client at construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::toolkit::KeyProvider;

/// Encoded public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(pub Vec<u8>);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({} bytes)", self.0.len())
    }
}

/// Encoded private key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Wrap raw key material.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Algorithm name plus both halves of a key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Public key algorithm (e.g. `rsa`).
    pub pkcs_name: String,
    /// Public half.
    pub public_key: PublicKey,
    /// Private half.
    pub private_key: PrivateKey,
}

/// Parameters for [`Keys::create`].
#[derive(Debug, Clone)]
pub struct KeyPairParams {
    public_path: PathBuf,
    private_path: PathBuf,
    identifier: Option<String>,
    passphrase: Option<String>,
    pkcs_name: String,
    key_length: u32,
}

impl KeyPairParams {
    /// Default public key algorithm.
    pub const DEFAULT_PKCS: &'static str = "rsa";
    /// Default key length in bits.
    pub const DEFAULT_KEY_LENGTH: u32 = 2048;

    /// Parameters writing the pair to the given files, with default algorithm and length.
    pub fn new(public_path: impl Into<PathBuf>, private_path: impl Into<PathBuf>) -> Self {
        Self {
            public_path: public_path.into(),
            private_path: private_path.into(),
            identifier: None,
            passphrase: None,
            pkcs_name: Self::DEFAULT_PKCS.to_owned(),
            key_length: Self::DEFAULT_KEY_LENGTH,
        }
    }

    /// Set the public key identifier string (e.g. `UN=alice, HN=example.org`).
    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Protect the private key with a passphrase.
    #[must_use]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Set the public key algorithm (default: `rsa`).
    #[must_use]
    pub fn pkcs_name(mut self, name: impl Into<String>) -> Self {
        self.pkcs_name = name.into();
        self
    }

    /// Set the key length in bits (default: 2048).
    #[must_use]
    pub const fn key_length(mut self, bits: u32) -> Self {
        self.key_length = bits;
        self
    }

    /// Public key file.
    #[must_use]
    pub fn public_path(&self) -> &Path {
        &self.public_path
    }

    /// Private key file.
    #[must_use]
    pub fn private_path(&self) -> &Path {
        &self.private_path
    }

    /// Public key identifier, if set.
    #[must_use]
    pub fn identifier_str(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Passphrase, if set.
    #[must_use]
    pub fn passphrase_str(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// Public key algorithm.
    #[must_use]
    pub fn pkcs(&self) -> &str {
        &self.pkcs_name
    }

    /// Key length in bits.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.key_length
    }
}

/// Shared handle to a loaded or generated key pair.
///
/// Clones share the same pair; the client keeps one clone for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys(Arc<KeyPair>);

impl Keys {
    /// Generate a new pair and write it to the files named in `params`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Keys`](crate::Error::Keys) if generation fails, or
    /// [`Error::Io`](crate::Error::Io) if the files cannot be written.
    pub fn create(provider: &dyn KeyProvider, params: &KeyPairParams) -> Result<Self> {
        let pair = provider.create_key_pair(params)?;
        tracing::debug!(
            pkcs = %pair.pkcs_name,
            bits = params.bits(),
            path = %params.public_path().display(),
            "key pair created"
        );
        Ok(Self::from_pair(pair))
    }

    /// Load an existing pair from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Keys`](crate::Error::Keys) if the files are malformed
    /// or the passphrase is wrong, or [`Error::Io`](crate::Error::Io) if they
    /// cannot be read.
    pub fn load(
        provider: &dyn KeyProvider,
        public_path: &Path,
        private_path: &Path,
        passphrase: Option<&str>,
    ) -> Result<Self> {
        provider
            .load_key_pair(public_path, private_path, passphrase)
            .map(Self::from_pair)
    }

    /// Wrap an already materialised pair.
    #[must_use]
    pub fn from_pair(pair: KeyPair) -> Self {
        Self(Arc::new(pair))
    }

    /// The underlying pair.
    #[must_use]
    pub fn pair(&self) -> &KeyPair {
        &self.0
    }

    /// Public key algorithm.
    #[must_use]
    pub fn pkcs_name(&self) -> &str {
        &self.0.pkcs_name
    }

    /// Public half.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.0.public_key
    }

    /// Private half.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.0.private_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_defaults() {
        let params = KeyPairParams::new("a.pub", "a.prv");
        assert_eq!(params.pkcs(), "rsa");
        assert_eq!(params.bits(), 2048);
        assert_eq!(params.identifier_str(), None);
        assert_eq!(params.passphrase_str(), None);

        let params = params.passphrase("pw").key_length(4096);
        assert_eq!(params.passphrase_str(), Some("pw"));
        assert_eq!(params.bits(), 4096);
    }

    #[test]
    fn private_key_is_redacted() {
        let pair = KeyPair {
            pkcs_name: "rsa".into(),
            public_key: PublicKey(vec![1, 2, 3]),
            private_key: PrivateKey::new(vec![0xde, 0xad]),
        };
        let shown = format!("{:?}", Keys::from_pair(pair));
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("222"));
        assert!(shown.contains("3 bytes"));
    }
}
