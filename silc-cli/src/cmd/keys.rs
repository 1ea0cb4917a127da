//! Key pair commands: create, show.

use std::fs;

use silc::loopback::FileKeyProvider;
use silc::{KeyPairParams, Keys};

use super::{CreateArgs, key_paths, profile_dir};

fn default_identifier() -> String {
    let identity = silc::Client::builder().identity();
    format!("UN={}, HN={}", identity.username, identity.hostname)
}

/// Generate the profile's key pair.
pub fn create(profile: &str, args: &CreateArgs) -> silc::Result<()> {
    let (public, private) = key_paths(profile);
    if public.exists() && !args.force {
        return Err(silc::Error::InvalidArgument(format!(
            "profile '{profile}' already has a key pair (use --force to replace it)"
        )));
    }
    fs::create_dir_all(profile_dir(profile))?;

    let mut params = KeyPairParams::new(&public, &private)
        .key_length(args.bits)
        .identifier(args.identifier.clone().unwrap_or_else(default_identifier));
    if let Some(ref passphrase) = args.passphrase {
        params = params.passphrase(passphrase);
    }
    let keys = Keys::create(&FileKeyProvider, &params)?;

    println!("Key pair for '{profile}' created.");
    print_keys(&keys);
    println!("  Files:     {}", public.display());
    println!("             {}", private.display());
    Ok(())
}

/// Print the profile's public key.
pub fn show(profile: &str, passphrase: Option<&str>) -> silc::Result<()> {
    let keys = load(profile, passphrase)?;
    println!("Profile:    {profile}");
    print_keys(&keys);
    Ok(())
}

/// Load the profile's pair, creating one without a passphrase if there is none.
pub fn load_or_create(profile: &str) -> silc::Result<Keys> {
    let (public, private) = key_paths(profile);
    if public.exists() {
        return load(profile, None);
    }
    fs::create_dir_all(profile_dir(profile))?;
    let params = KeyPairParams::new(&public, &private).identifier(default_identifier());
    let keys = Keys::create(&FileKeyProvider, &params)?;
    eprintln!("Created key pair in {}", profile_dir(profile).display());
    Ok(keys)
}

fn load(profile: &str, passphrase: Option<&str>) -> silc::Result<Keys> {
    let (public, private) = key_paths(profile);
    if !public.exists() {
        return Err(silc::Error::InvalidArgument(format!(
            "profile '{profile}' has no key pair (run `silc keys create`)"
        )));
    }
    Keys::load(&FileKeyProvider, &public, &private, passphrase)
}

fn print_keys(keys: &Keys) {
    println!("  Algorithm: {}", keys.pkcs_name());
    println!("  Key bits:  {}", keys.private_key().as_bytes().len() * 8);
    println!("  Public:    {}", hex::encode(&keys.public_key().0));
}
