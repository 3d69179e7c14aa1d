//! Redaction of formatted log lines.
//!
//! The lifecycle logs record ids, request ids and hashed sample keys, never
//! plaintext fields. This writer is the backstop for anything that slips
//! through: nucleotide runs, UUID sample ids, emails, labelled secrets,
//! serialized ciphertexts and PEM blocks are replaced before a line reaches
//! the sink.
//!
//! Lines longer than `GENOVAULT_SANITIZE_MAX_BYTES` (default 16 KiB) are cut
//! and marked `[TRUNCATED]`.

use std::borrow::Cow;
use std::io::Write;
use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024;

/// `(pattern, replacement)`, applied in order.
const RULES: &[(&str, &str)] = &[
    // Reads, including N for unknown bases
    (r"(?i)\b[ACGTUN]{8,}\b", "[REDACTED-SEQUENCE]"),
    (
        r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
        "[REDACTED-UUID]",
    ),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    // Labelled secrets: `seed=...`, `proof: ...` in base64 or hex
    (
        r"(?i)\b(?:secret|password|private[_-]?key|seed|signature|proof|token)\b\s*[:=]\s*(?:[A-Za-z0-9+/]{32,}={0,2}|[0-9a-fA-F]{16,})",
        "[REDACTED-SECRET]",
    ),
    // Transport-form ciphertexts and signatures
    (r"[A-Za-z0-9+/]{64,}={0,2}", "[REDACTED-BLOB]"),
];

// Kept out of the RegexSet: a bounded multi-line body inflates the merged program.
const PEM_RULE: (&str, &str) = (
    r"-----BEGIN [A-Z0-9 ]{0,40}KEY-----[\s\S]{0,8192}?-----END [A-Z0-9 ]{0,40}KEY-----",
    "[REDACTED-PEM]",
);

/// Compiled redaction rules plus the per-line byte limit.
pub struct Sanitizer {
    any: RegexSet,
    rules: Vec<(Regex, &'static str)>,
    pem: (Regex, &'static str),
    max_line_bytes: usize,
}

impl Sanitizer {
    /// Process-wide sanitizer, limit taken from the environment on first use.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Sanitizer> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let limit = std::env::var("GENOVAULT_SANITIZE_MAX_BYTES")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&v| v > 0)
                .unwrap_or(DEFAULT_MAX_LINE_BYTES);
            Self::with_limit(limit)
        })
    }

    /// Build a sanitizer that keeps at most `max_line_bytes` of each line.
    #[must_use]
    pub fn with_limit(max_line_bytes: usize) -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("Valid regex");
        Self {
            any: RegexSet::new(RULES.iter().map(|(p, _)| *p)).expect("Valid regex set"),
            rules: RULES.iter().map(|(p, r)| (compile(p), *r)).collect(),
            pem: (compile(PEM_RULE.0), PEM_RULE.1),
            max_line_bytes,
        }
    }

    /// Redact one line. Clean lines within the limit are returned borrowed.
    #[must_use]
    pub fn sanitize<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let mut end = line.len().min(self.max_line_bytes);
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        let kept = &line[..end];

        let hits = self.any.matches(kept);
        let has_pem = kept.contains("-----BEGIN ");
        let mut out = Cow::Borrowed(kept);

        for idx in hits.iter() {
            out = apply(out, &self.rules[idx]);
        }
        if has_pem {
            out = apply(out, &self.pem);
        }

        if end < line.len() {
            let mut owned = out.into_owned();
            owned.push_str(" [TRUNCATED]");
            // Keep the line terminator so the next event starts on its own line.
            if line.ends_with('\n') {
                owned.push('\n');
            }
            out = Cow::Owned(owned);
        }
        out
    }
}

fn apply<'a>(text: Cow<'a, str>, (regex, replacement): &(Regex, &'static str)) -> Cow<'a, str> {
    let replaced = match regex.replace_all(&text, *replacement) {
        Cow::Owned(s) => Some(s),
        Cow::Borrowed(_) => None,
    };
    replaced.map_or(text, Cow::Owned)
}

/// `MakeWriter` that routes each formatted event through `Sanitizer::global`.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter::new(self.inner.make_writer(), Sanitizer::global())
    }
}

/// Line-buffering writer. Complete lines are sanitized as they arrive; a
/// trailing partial line is emitted on flush or drop.
pub struct SanitizingWriter<W: Write> {
    inner: W,
    sanitizer: &'static Sanitizer,
    pending: Vec<u8>,
}

impl<W: Write> SanitizingWriter<W> {
    fn new(inner: W, sanitizer: &'static Sanitizer) -> Self {
        Self {
            inner,
            sanitizer,
            pending: Vec::new(),
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner
            .write_all(self.sanitizer.sanitize(&text).as_bytes())
    }

    fn emit_complete_lines(&mut self) -> std::io::Result<()> {
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Ok(());
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        for line in complete.split_inclusive(|&b| b == b'\n') {
            self.emit(line)?;
        }
        Ok(())
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.emit_complete_lines()?;

        // A newline-free run past twice the limit is cut here instead of buffered.
        if self.pending.len() > self.sanitizer.max_line_bytes.saturating_mul(2) {
            let run = std::mem::take(&mut self.pending);
            self.emit(&run)?;
            self.inner.write_all(b"\n")?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.emit_complete_lines()?;
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.emit(&tail)?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            let _ = self.emit(&tail);
        }
    }
}
