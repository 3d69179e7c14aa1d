//! Command-line run flow for the `genovault` binary.
//!
//! A run encrypts a batch of plaintext submissions, drives each record through
//! the full lifecycle against the local signing oracle, mirrors every record
//! into the ledger store, and optionally decrypts per-sample counts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::oracle::SigningOracle;
use crate::application::{LedgerMirror, LifecycleError, RecordLifecycle, StoredRecord};
use crate::domain::{RecordId, RequestId, SampleCount};
use crate::ports::{EncryptionCapability, KeyValueStore, PlaintextDecryptor, PlaintextEncryptor};
use crate::GenovaultError;

pub const USAGE: &str = "Usage: genovault run <submissions.json> [--db <path>] [--no-reveal] [--count <sample>]... [--reset]

Encrypts each { read, metadata, sample_id } entry, submits it, requests and
verifies its decryption, and mirrors the ledger to the SQLite database.
--db :memory: keeps the ledger in memory for this run only.";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub submissions: PathBuf,

    /// Overrides `GENOVAULT_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Request and resolve decryption of every submitted record
    pub reveal: bool,

    /// Samples whose aggregate count is decrypted after the run
    pub count_samples: Vec<String>,

    /// Clear the ledger store before mirroring
    pub reset: bool,
}

impl Command {
    /// Parse arguments (without the program name).
    ///
    /// # Errors
    /// Returns `GenovaultError::Config` for unknown or incomplete arguments.
    pub fn parse<I>(args: I) -> Result<Self, GenovaultError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        match args.next().as_deref() {
            Some("run") => {}
            Some("-h" | "--help") | None => return Ok(Self::Help),
            Some(other) => {
                return Err(GenovaultError::Config(format!("Unknown command: {other}")));
            }
        }

        let mut submissions = None;
        let mut options = RunOptions {
            submissions: PathBuf::new(),
            db_path: None,
            reveal: true,
            count_samples: Vec::new(),
            reset: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let p = args.next().filter(|p| !p.is_empty()).ok_or_else(|| {
                        GenovaultError::Config("--db requires a path".to_string())
                    })?;
                    options.db_path = Some(PathBuf::from(p));
                }
                "--count" => {
                    let s = args.next().filter(|s| !s.is_empty()).ok_or_else(|| {
                        GenovaultError::Config("--count requires a sample id".to_string())
                    })?;
                    options.count_samples.push(s);
                }
                "--no-reveal" => options.reveal = false,
                "--reset" => options.reset = true,
                "-h" | "--help" => return Ok(Self::Help),
                _ if arg.starts_with('-') => {
                    return Err(GenovaultError::Config(format!("Unknown arg: {arg}")));
                }
                _ if submissions.is_none() => submissions = Some(PathBuf::from(arg)),
                _ => {
                    return Err(GenovaultError::Config(format!("Unexpected argument: {arg}")));
                }
            }
        }

        options.submissions = submissions
            .ok_or_else(|| GenovaultError::Config("Missing <submissions.json>".to_string()))?;
        Ok(Self::Run(options))
    }
}

/// One plaintext submission, as read from the input file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    pub read: String,
    pub metadata: String,
    pub sample_id: String,
}

/// Read a JSON array of submissions.
///
/// # Errors
/// Returns error if the file cannot be read or is not a submission array.
pub fn load_submissions(path: &Path) -> Result<Vec<Submission>, GenovaultError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub records: Vec<StoredRecord>,

    /// Decrypted count per requested sample; `None` if the sample has none
    pub counts: Vec<(String, Option<u32>)>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} record(s)", self.records.len())?;
        for r in &self.records {
            if r.revealed {
                writeln!(
                    f,
                    "  #{} [REVEALED] read={} metadata={} sample={}",
                    r.id, r.read, r.metadata, r.sample_id
                )?;
            } else {
                writeln!(f, "  #{} [SEALED] submitted {}", r.id, r.submitted_at.to_rfc3339())?;
            }
        }
        for (sample, count) in &self.counts {
            match count {
                Some(n) => writeln!(f, "  count({sample}) = {n}")?,
                None => writeln!(f, "  count({sample}) = no revealed records")?,
            }
        }
        Ok(())
    }
}

/// Drive a batch of submissions through the lifecycle.
///
/// Decryption callbacks are delivered in reverse request order, so records
/// resolve out of submission order. New records get ids after those already
/// in the ledger, and counts cover this run's reveals only.
///
/// # Errors
/// Returns error on encryption, oracle, lifecycle or storage failure.
pub fn run<C, S>(
    options: &RunOptions,
    submissions: &[Submission],
    capability: Arc<C>,
    oracle: Arc<SigningOracle>,
    store: Arc<S>,
) -> Result<RunReport, GenovaultError>
where
    C: EncryptionCapability + PlaintextEncryptor + PlaintextDecryptor,
    S: KeyValueStore,
    S::Error: Into<crate::adapters::StorageError>,
{
    let mirror = LedgerMirror::new(store);
    let last_id = mirror.last_id()?;
    if !last_id.is_none() {
        tracing::info!("Ledger already holds records up to #{last_id}; continuing after it");
    }
    let mut lifecycle =
        RecordLifecycle::continuing_after(Arc::clone(&capability), Arc::clone(&oracle), last_id);

    let mut ids: Vec<RecordId> = Vec::with_capacity(submissions.len());
    for submission in submissions {
        let read = capability.encrypt_text(&submission.read)?;
        let metadata = capability.encrypt_text(&submission.metadata)?;
        let sample_id = capability.encrypt_text(&submission.sample_id)?;

        let id = lifecycle.submit(read, metadata, sample_id);
        mirror.sync_record(&lifecycle, id)?;
        ids.push(id);
    }
    tracing::info!("Submitted {} encrypted record(s)", ids.len());

    if options.reveal {
        let requests = ids
            .iter()
            .map(|id| lifecycle.request_decryption(*id))
            .collect::<Result<Vec<RequestId>, _>>()?;

        for request_id in requests.into_iter().rev() {
            let response = oracle.fulfil(request_id, capability.as_ref())?;
            lifecycle.deliver(
                response.callback,
                response.request_id,
                &response.cleartexts,
                &response.proof,
            )?;
        }

        for id in &ids {
            mirror.sync_record(&lifecycle, *id)?;
        }
    }

    let mut counts = Vec::with_capacity(options.count_samples.len());
    for sample in &options.count_samples {
        let count = match decrypt_count(&mut lifecycle, &oracle, capability.as_ref(), sample) {
            Ok(c) => Some(c.count),
            Err(LifecycleError::SampleNotFound(_)) => {
                tracing::warn!("No aggregate count for requested sample");
                None
            }
            Err(e) => return Err(e.into()),
        };
        counts.push((sample.clone(), count));
    }

    let records = ids
        .iter()
        .filter_map(|id| mirror.load_record(*id).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RunReport { records, counts })
}

fn decrypt_count<E, D>(
    lifecycle: &mut RecordLifecycle<E, SigningOracle>,
    oracle: &SigningOracle,
    decryptor: &D,
    sample: &str,
) -> Result<SampleCount, LifecycleError>
where
    E: EncryptionCapability,
    D: PlaintextDecryptor + ?Sized,
{
    let request_id = lifecycle.request_sample_count_decryption(sample)?;
    let response = oracle.fulfil(request_id, decryptor)?;
    lifecycle.resolve_sample_count_decryption(request_id, &response.cleartexts, &response.proof)
}

/// Verify that the oracle's authority key matches a pinned base64 public key.
///
/// # Errors
/// Returns `GenovaultError::Config` if the key cannot be decoded or differs.
pub fn check_pinned_authority(oracle: &SigningOracle, pinned_b64: &str) -> Result<(), GenovaultError> {
    use base64::Engine;

    let pinned = base64::engine::general_purpose::STANDARD
        .decode(pinned_b64.trim())
        .map_err(|e| GenovaultError::Config(format!("Invalid pinned oracle key: {e}")))?;
    if pinned.as_slice() != oracle.verifying_key().as_bytes() {
        return Err(GenovaultError::Config(
            "Oracle authority key does not match the pinned key".to_string(),
        ));
    }
    Ok(())
}
