#![cfg(feature = "loopback")]

use silc::loopback::{FileKeyProvider, LoopbackToolkit, Network};
use silc::{Client, Error, KeyPairParams, Keys};

#[test]
fn created_keys_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let params = KeyPairParams::new(dir.path().join("alice.pub"), dir.path().join("alice.prv"))
        .identifier("UN=alice, HN=localhost")
        .passphrase("correct horse")
        .key_length(1024);

    let created = Keys::create(&FileKeyProvider, &params).unwrap();
    assert_eq!(created.pkcs_name(), KeyPairParams::DEFAULT_PKCS);
    assert_eq!(created.private_key().as_bytes().len(), 128);
    assert!(!format!("{:?}", created.private_key()).contains(&hex_prefix(&created)));

    let loaded = Keys::load(
        &FileKeyProvider,
        params.public_path(),
        params.private_path(),
        Some("correct horse"),
    )
    .unwrap();
    assert_eq!(loaded, created);

    let client = Client::builder()
        .nickname("alice")
        .build(LoopbackToolkit::new(Network::new()), loaded)
        .unwrap();
    assert_eq!(client.keys().public_key(), created.public_key());
}

#[test]
fn wrong_passphrase_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let params = KeyPairParams::new(dir.path().join("k.pub"), dir.path().join("k.prv"))
        .passphrase("secret")
        .key_length(256);
    Keys::create(&FileKeyProvider, &params).unwrap();

    let result = Keys::load(
        &FileKeyProvider,
        params.public_path(),
        params.private_path(),
        Some("guess"),
    );
    assert!(matches!(result, Err(Error::Keys(_))));
}

#[test]
fn tampered_public_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let params = KeyPairParams::new(dir.path().join("k.pub"), dir.path().join("k.prv"))
        .key_length(256);
    Keys::create(&FileKeyProvider, &params).unwrap();

    let text = std::fs::read_to_string(params.public_path()).unwrap();
    let tampered: String = text
        .lines()
        .map(|line| {
            if line.starts_with("public=") {
                format!("public={}\n", "00".repeat(32))
            } else {
                format!("{line}\n")
            }
        })
        .collect();
    std::fs::write(params.public_path(), tampered).unwrap();

    let result = Keys::load(&FileKeyProvider, params.public_path(), params.private_path(), None);
    assert!(matches!(result, Err(Error::Keys(_))));
}

fn hex_prefix(keys: &Keys) -> String {
    keys.private_key().as_bytes()[..4]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
