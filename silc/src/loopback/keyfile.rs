//! Key pairs stored as small `key=value` text files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sha3::{Digest, Sha3_256};

use crate::error::{Error, Result};
use crate::keys::{KeyPair, KeyPairParams, PrivateKey, PublicKey};
use crate::toolkit::KeyProvider;

/// [`KeyProvider`] that writes random key material to plain files.
///
/// The private half is random bytes; the public half is its SHA3-256 digest.
/// A passphrase is not used for encryption, only folded into a check value
/// that [`load_key_pair`](KeyProvider::load_key_pair) verifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileKeyProvider;

fn check_value(passphrase: Option<&str>, public: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(passphrase.unwrap_or_default().as_bytes());
    hasher.update(public);
    hex::encode(hasher.finalize())
}

fn parse(path: &Path) -> Result<HashMap<String, String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect())
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str, path: &Path) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::Keys(format!("{}: missing `{name}`", path.display())))
}

fn decode(value: &str, name: &str, path: &Path) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| Error::Keys(format!("{}: bad `{name}`: {e}", path.display())))
}

impl KeyProvider for FileKeyProvider {
    fn create_key_pair(&self, params: &KeyPairParams) -> Result<KeyPair> {
        let bits = params.bits();
        if bits == 0 || bits % 8 != 0 {
            return Err(Error::Keys(format!("unsupported key length {bits}")));
        }
        let mut private = vec![0u8; (bits / 8) as usize];
        getrandom::fill(&mut private).map_err(|e| Error::Keys(e.to_string()))?;
        let public = Sha3_256::digest(&private).to_vec();

        let mut public_file = format!("pkcs={}\nbits={bits}\n", params.pkcs());
        if let Some(identifier) = params.identifier_str() {
            public_file.push_str(&format!("identifier={identifier}\n"));
        }
        public_file.push_str(&format!("public={}\n", hex::encode(&public)));
        let private_file = format!(
            "pkcs={}\ncheck={}\nprivate={}\n",
            params.pkcs(),
            check_value(params.passphrase_str(), &public),
            hex::encode(&private),
        );
        fs::write(params.public_path(), public_file)?;
        fs::write(params.private_path(), private_file)?;
        tracing::debug!(
            public = %params.public_path().display(),
            bits,
            "key pair written"
        );

        Ok(KeyPair {
            pkcs_name: params.pkcs().to_owned(),
            public_key: PublicKey(public),
            private_key: PrivateKey::new(private),
        })
    }

    fn load_key_pair(
        &self,
        public_path: &Path,
        private_path: &Path,
        passphrase: Option<&str>,
    ) -> Result<KeyPair> {
        let public_fields = parse(public_path)?;
        let private_fields = parse(private_path)?;

        let pkcs_name = field(&public_fields, "pkcs", public_path)?;
        if field(&private_fields, "pkcs", private_path)? != pkcs_name {
            return Err(Error::Keys("public and private key algorithms differ".into()));
        }
        let public = decode(field(&public_fields, "public", public_path)?, "public", public_path)?;
        let private = decode(
            field(&private_fields, "private", private_path)?,
            "private",
            private_path,
        )?;
        if field(&private_fields, "check", private_path)? != check_value(passphrase, &public) {
            return Err(Error::Keys("wrong passphrase or mismatched key files".into()));
        }

        Ok(KeyPair {
            pkcs_name: pkcs_name.to_owned(),
            public_key: PublicKey(public),
            private_key: PrivateKey::new(private),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let params = KeyPairParams::new(dir.path().join("k.pub"), dir.path().join("k.prv"))
            .identifier("UN=alice, HN=localhost")
            .key_length(256);
        let created = FileKeyProvider.create_key_pair(&params).unwrap();
        assert_eq!(created.private_key.as_bytes().len(), 32);
        assert_eq!(created.public_key.0.len(), 32);

        let text = fs::read_to_string(params.public_path()).unwrap();
        assert!(text.contains("identifier=UN=alice, HN=localhost"));

        let loaded = FileKeyProvider
            .load_key_pair(params.public_path(), params.private_path(), None)
            .unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn passphrase_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let params = KeyPairParams::new(dir.path().join("k.pub"), dir.path().join("k.prv"))
            .passphrase("hunter2")
            .key_length(128);
        FileKeyProvider.create_key_pair(&params).unwrap();

        let load = |p: Option<&str>| {
            FileKeyProvider.load_key_pair(params.public_path(), params.private_path(), p)
        };
        assert!(load(Some("hunter2")).is_ok());
        assert!(matches!(load(Some("hunter3")), Err(Error::Keys(_))));
        assert!(matches!(load(None), Err(Error::Keys(_))));
    }

    #[test]
    fn odd_key_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let params = KeyPairParams::new(dir.path().join("k.pub"), dir.path().join("k.prv"))
            .key_length(12);
        assert!(matches!(
            FileKeyProvider.create_key_pair(&params),
            Err(Error::Keys(_))
        ));
        assert!(!params.public_path().exists());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileKeyProvider.load_key_pair(
            &dir.path().join("none.pub"),
            &dir.path().join("none.prv"),
            None,
        );
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
