//! Master key files.
//!
//! Accepted on read: 64 hex characters (surrounding whitespace ignored) or
//! exactly 32 raw bytes. Written as hex with a trailing newline.

use anyhow::Context;
use meshseal_crypto::{AeadKey, KEY_SIZE};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use zeroize::Zeroizing;

/// Read a master key from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold exactly one
/// 32-byte key.
pub fn load_master_key(path: &Path) -> anyhow::Result<AeadKey> {
    let contents = Zeroizing::new(
        fs::read(path).with_context(|| format!("reading master key {}", path.display()))?,
    );

    if contents.len() == KEY_SIZE {
        return Ok(AeadKey::from_slice(&contents)?);
    }

    let text = std::str::from_utf8(&contents)
        .with_context(|| format!("master key {} is neither hex nor raw", path.display()))?;
    let bytes = Zeroizing::new(
        hex::decode(text.trim())
            .with_context(|| format!("master key {} is not valid hex", path.display()))?,
    );
    Ok(AeadKey::from_slice(&bytes)?)
}

/// Write `key` to `path` as hex, creating parent directories.
///
/// The file is owner-only before any key byte is written, including when
/// it already exists with looser permissions.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_master_key(path: &Path, key: &AeadKey) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = open_owner_only(path)
        .with_context(|| format!("creating master key {}", path.display()))?;

    let mut encoded = Zeroizing::new(hex::encode(key.as_bytes()));
    encoded.push('\n');
    file.write_all(encoded.as_bytes())
        .and_then(|()| file.sync_all())
        .with_context(|| format!("writing master key {}", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a pre-existing file too.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
