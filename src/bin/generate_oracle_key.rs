//! Ed25519 authority key generation for the decryption oracle.
//!
//! Generates a cryptographically secure Ed25519 signing keypair:
//! - Private seed (32 bytes) written to file with 0600 permissions
//! - Public key optionally written separately, for `GENOVAULT_ORACLE_PUBKEY`
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_oracle_key -- --out-seed <path> [--out-pub <path>] [--force]
//! ```
//!
//! Point `GENOVAULT_ORACLE_SEED_FILE` at the seed file to use the key.
//!
//! # Security
//!
//! - Uses OS entropy (OsRng) for key generation
//! - Private seed is zeroized from memory after use
//! - Output file has restricted permissions (Unix only)

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use zeroize::Zeroize;
use zeroize::Zeroizing;

const USAGE: &str = "Usage: generate_oracle_key --out-seed <path> [--out-pub <path>] [--force]";

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(contents)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut out_seed_path: Option<PathBuf> = None;
    let mut out_pub_path: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-seed" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
                out_seed_path = Some(PathBuf::from(p));
            }
            "--out-pub" => {
                let p = args.next().unwrap_or_default();
                if p.is_empty() {
                    eprintln!("{USAGE}");
                    std::process::exit(2);
                }
                out_pub_path = Some(PathBuf::from(p));
            }
            "--force" => force = true,
            "-h" | "--help" => {
                println!(
                    "{USAGE}\n\nWrites the base64 Ed25519 oracle seed to <path> with 0600 permissions. Optionally writes the base64 public key to --out-pub. Prints only non-secret material."
                );
                return Ok(());
            }
            _ => {
                eprintln!("Unknown arg: {arg}\n{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let Some(out_seed_path) = out_seed_path else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    for path in std::iter::once(&out_seed_path).chain(out_pub_path.as_ref()) {
        if path.exists() && !force {
            bail!("Refusing to overwrite existing file {path:?}. Use --force.");
        }
    }

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);

    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();

    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    // Best-effort: wipe seed from memory.
    seed.zeroize();

    write_file(&out_seed_path, seed_b64.as_bytes(), 0o600)?;
    if let Some(pub_path) = &out_pub_path {
        // Public key is non-secret; allow read access.
        write_file(pub_path, pub_b64.as_bytes(), 0o644)?;
    }

    // Print only non-secret material.
    println!("Wrote oracle seed (base64) to {out_seed_path:?}");
    if let Some(pub_path) = &out_pub_path {
        println!("Wrote public key (base64) to {pub_path:?}");
    }
    println!("GENOVAULT_ORACLE_PUBKEY={pub_b64}");
    println!("Authority key (hex)={}", to_hex(verifying_key.as_bytes()));

    Ok(())
}
