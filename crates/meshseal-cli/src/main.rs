//! MeshSeal CLI
//!
//! Provisioning and field debugging for ChaCha20-Poly1305 mesh packet
//! protection.

mod config;
mod keyfile;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

use config::Config;
use meshseal_crypto::kdf::{SessionKeyring, rotation_id_at};
use meshseal_crypto::random::random_key;
use meshseal_crypto::{AeadKey, NodeAddress, Nonce, Tag, derive_packet_nonce};

/// MeshSeal - authenticated encryption for mesh broadcast packets
#[derive(Parser)]
#[command(name = "meshseal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path [default: <config dir>/meshseal/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Master key file, overriding the configured one
    #[arg(short, long)]
    master_key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new master key
    Keygen {
        /// Output file for the master key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Derive the session key for a rotation period
    DeriveKey {
        /// Rotation id
        #[arg(long, conflicts_with = "at")]
        rotation: Option<u32>,

        /// Unix time (seconds) inside the rotation period
        #[arg(long)]
        at: Option<u64>,
    },

    /// Show the nonce for a packet
    Nonce {
        #[command(flatten)]
        packet: PacketArgs,
    },

    /// Encrypt and authenticate a payload
    Seal {
        #[command(flatten)]
        packet: PacketArgs,

        /// Associated data (cleartext header), hex
        #[arg(long, default_value = "")]
        aad: String,

        /// Payload, hex
        #[arg(long)]
        payload: String,
    },

    /// Verify and decrypt a payload
    Open {
        #[command(flatten)]
        packet: PacketArgs,

        /// Associated data (cleartext header), hex
        #[arg(long, default_value = "")]
        aad: String,

        /// Ciphertext, hex
        #[arg(long)]
        ciphertext: String,

        /// Authentication tag, hex
        #[arg(long)]
        tag: String,
    },
}

/// Fields that select the session key and nonce of one packet.
#[derive(Args)]
struct PacketArgs {
    /// Packet id from the packet header
    #[arg(long)]
    packet_id: u32,

    /// Sender address [default: node address from config]
    #[arg(long)]
    source: Option<NodeAddress>,

    /// Rotation id [default: current period]
    #[arg(long)]
    rotation: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing default config means built-in defaults; only init-config writes one.
    let config = match (&cli.config, &cli.command) {
        (_, Commands::InitConfig { .. }) => Config::default(),
        (Some(path), _) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        (None, _) => Config::load_or_default()?,
    };

    // Initialize logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    // Validate configuration
    config.validate()?;

    let master_key_path = cli
        .master_key
        .clone()
        .unwrap_or_else(|| config.keys.master_key_file.clone());

    match cli.command {
        Commands::Keygen { output } => {
            generate_master_key(output)?;
        }
        Commands::InitConfig { force } => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            init_config(&path, force)?;
        }
        Commands::DeriveKey { rotation, at } => {
            let rotation = match (rotation, at) {
                (Some(id), _) => id,
                (None, Some(secs)) => rotation_id_at(secs, config.rotation_period()?),
                (None, None) => current_rotation(&config)?,
            };
            derive_key(&master_key_path, rotation)?;
        }
        Commands::Nonce { packet } => {
            let session = PacketSession::resolve(&packet, &config, &master_key_path)?;
            println!("{}", hex::encode(session.nonce.as_bytes()));
        }
        Commands::Seal {
            packet,
            aad,
            payload,
        } => {
            let session = PacketSession::resolve(&packet, &config, &master_key_path)?;
            seal_payload(&session, &aad, &payload)?;
        }
        Commands::Open {
            packet,
            aad,
            ciphertext,
            tag,
        } => {
            let session = PacketSession::resolve(&packet, &config, &master_key_path)?;
            open_payload(&session, &aad, &ciphertext, &tag)?;
        }
    }

    Ok(())
}

/// Session key and nonce for one packet.
struct PacketSession {
    key: AeadKey,
    nonce: Nonce,
}

impl PacketSession {
    fn resolve(
        packet: &PacketArgs,
        config: &Config,
        master_key_path: &std::path::Path,
    ) -> anyhow::Result<Self> {
        let source = match packet.source {
            Some(addr) => addr,
            None => config.node_address()?.ok_or_else(|| {
                anyhow::anyhow!("No sender address: pass --source or set [node] address")
            })?,
        };
        let rotation = match packet.rotation {
            Some(id) => id,
            None => current_rotation(config)?,
        };

        let mut keyring = SessionKeyring::new(keyfile::load_master_key(master_key_path)?);
        let key = keyring.session_key(rotation)?.clone();
        let nonce = derive_packet_nonce(&key, packet.packet_id, &source);

        tracing::debug!(
            rotation,
            packet_id = packet.packet_id,
            %source,
            "resolved packet session"
        );
        Ok(Self { key, nonce })
    }
}

fn current_rotation(config: &Config) -> anyhow::Result<u32> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    Ok(rotation_id_at(now.as_secs(), config.rotation_period()?))
}

fn decode_hex_arg(name: &str, value: &str) -> anyhow::Result<Vec<u8>> {
    hex::decode(value.trim()).with_context(|| format!("--{name} is not valid hex"))
}

/// Generate a master key and store or print it
fn generate_master_key(output: Option<PathBuf>) -> anyhow::Result<()> {
    let key = random_key()?;

    if let Some(path) = output {
        keyfile::save_master_key(&path, &key)?;
        tracing::info!(path = %path.display(), "master key written");
        println!("Master key saved to: {}", path.display());
        println!("\nKeep this file secure! Every node provisioned with it can read the mesh.");
    } else {
        let encoded = Zeroizing::new(hex::encode(key.as_bytes()));
        println!("{}", encoded.as_str());
    }

    Ok(())
}

/// Persist the built-in defaults to `path`
fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config {} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;
    tracing::info!(path = %path.display(), "default config written");
    println!("Config written to: {}", path.display());
    Ok(())
}

/// Print the session key for `rotation`
fn derive_key(master_key_path: &std::path::Path, rotation: u32) -> anyhow::Result<()> {
    let mut keyring = SessionKeyring::new(keyfile::load_master_key(master_key_path)?);
    let key = keyring.session_key(rotation)?;

    let encoded = Zeroizing::new(hex::encode(key.as_bytes()));
    println!("rotation: {rotation}");
    println!("session_key: {}", encoded.as_str());
    Ok(())
}

/// Seal a payload and print `ciphertext` and `tag`
fn seal_payload(session: &PacketSession, aad: &str, payload: &str) -> anyhow::Result<()> {
    let aad = decode_hex_arg("aad", aad)?;
    let mut buffer = Zeroizing::new(decode_hex_arg("payload", payload)?);

    let tag = session
        .key
        .seal_in_place(&session.nonce, &aad, buffer.as_mut_slice())?;

    println!("ciphertext: {}", hex::encode(buffer.as_slice()));
    println!("tag: {}", hex::encode(tag.as_bytes()));
    Ok(())
}

/// Open a payload and print the plaintext
fn open_payload(
    session: &PacketSession,
    aad: &str,
    ciphertext: &str,
    tag: &str,
) -> anyhow::Result<()> {
    let aad = decode_hex_arg("aad", aad)?;
    let tag_bytes = decode_hex_arg("tag", tag)?;
    let tag = Tag::from_slice(&tag_bytes)
        .ok_or_else(|| anyhow::anyhow!("--tag must be {} bytes", meshseal_crypto::TAG_SIZE))?;
    let mut buffer = Zeroizing::new(decode_hex_arg("ciphertext", ciphertext)?);

    session
        .key
        .open_in_place(&session.nonce, &aad, buffer.as_mut_slice(), &tag)
        .context("packet rejected")?;

    println!("plaintext: {}", hex::encode(buffer.as_slice()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_seal() {
        let cli = Cli::try_parse_from([
            "meshseal",
            "--master-key",
            "/tmp/k",
            "seal",
            "--packet-id",
            "42",
            "--source",
            "24:6f:28:aa:bb:cc",
            "--payload",
            "00ff",
        ])
        .unwrap();

        assert_eq!(cli.master_key, Some(PathBuf::from("/tmp/k")));
        let Commands::Seal { packet, aad, payload } = cli.command else {
            panic!("expected seal");
        };
        assert_eq!(packet.packet_id, 42);
        assert_eq!(packet.source.unwrap().to_string(), "24:6f:28:aa:bb:cc");
        assert!(packet.rotation.is_none());
        assert_eq!(aad, "");
        assert_eq!(payload, "00ff");
    }

    #[test]
    fn test_derive_key_rotation_conflicts_with_at() {
        assert!(
            Cli::try_parse_from(["meshseal", "derive-key", "--rotation", "1", "--at", "5"]).is_err()
        );
    }

    #[test]
    fn test_bad_source_rejected() {
        assert!(
            Cli::try_parse_from(["meshseal", "nonce", "--packet-id", "1", "--source", "nope"])
                .is_err()
        );
    }

    #[test]
    fn test_parse_init_config() {
        let cli = Cli::try_parse_from(["meshseal", "-c", "/tmp/m.toml", "init-config", "--force"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
        assert!(matches!(cli.command, Commands::InitConfig { force: true }));
    }

    #[test]
    fn test_init_config_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meshseal/config.toml");

        init_config(&path, false).unwrap();
        let written = Config::load(&path).unwrap();
        assert_eq!(written.logging.level, "info");

        assert!(init_config(&path, false).is_err());
        assert!(init_config(&path, true).is_ok());
    }

    #[test]
    fn test_resolve_matches_library_derivation() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("master.key");
        let master = AeadKey::new([0x77; 32]);
        keyfile::save_master_key(&key_path, &master).unwrap();

        let source: NodeAddress = "02:00:00:00:00:09".parse().unwrap();
        let packet = PacketArgs {
            packet_id: 1000,
            source: Some(source),
            rotation: Some(3),
        };
        let session = PacketSession::resolve(&packet, &Config::default(), &key_path).unwrap();

        let expected = meshseal_crypto::derive_session_key(&master, 3).unwrap();
        assert_eq!(session.key.as_bytes(), expected.as_bytes());
        assert_eq!(session.nonce, derive_packet_nonce(&expected, 1000, &source));
    }
}
