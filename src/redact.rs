//! Secret redaction for log output.
//!
//! A [`Redactor`] is the registry masked values are written into during
//! injection. [`RedactingMakeWriter`] wraps any `tracing_subscriber` writer so
//! every formatted record passes through [`Redactor::mask`] before it is
//! written. [`copy_redacted`] does the same for a raw byte stream such as a
//! child process's output.

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::fmt::MakeWriter;

/// Replacement text for a masked value.
pub const PLACEHOLDER: &str = "****";

/// Shared registry of literals that must never reach a log.
///
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Arc<RwLock<Vec<String>>>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for masking. Blank values are ignored.
    pub fn register(&self, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        let mut secrets = self.secrets.write();
        if secrets.iter().any(|s| s == value) {
            return;
        }
        secrets.push(value.to_string());
        // Longest first so a secret containing another is replaced whole.
        secrets.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.read().is_empty()
    }

    /// Replaces every registered value in `text` with [`PLACEHOLDER`].
    pub fn mask<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let secrets = self.secrets.read();
        if !secrets.iter().any(|s| text.contains(s.as_str())) {
            return Cow::Borrowed(text);
        }
        let mut masked = text.to_string();
        for secret in secrets.iter() {
            if masked.contains(secret.as_str()) {
                masked = masked.replace(secret.as_str(), PLACEHOLDER);
            }
        }
        Cow::Owned(masked)
    }

    /// Byte-level [`Redactor::mask`]; `data` need not be valid UTF-8.
    pub fn mask_bytes(&self, data: &[u8]) -> Vec<u8> {
        let secrets = self.secrets.read();
        let mut masked = data.to_vec();
        for secret in secrets.iter() {
            masked = replace_bytes(&masked, secret.as_bytes(), PLACEHOLDER.as_bytes());
        }
        masked
    }

    /// Length of the longest suffix of `data` that could be the start of a
    /// registered value still to be completed by later bytes.
    fn partial_suffix_len(&self, data: &[u8]) -> usize {
        let secrets = self.secrets.read();
        let longest = secrets.first().map_or(0, String::len);
        let max = longest.saturating_sub(1).min(data.len());
        (1..=max)
            .rev()
            .find(|&k| {
                let tail = &data[data.len() - k..];
                secrets.iter().any(|s| s.as_bytes().starts_with(tail))
            })
            .unwrap_or(0)
    }
}

fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Copies `reader` to `writer`, masking registered values on the way.
///
/// Works on raw bytes, so output that is not UTF-8 passes through untouched.
/// Bytes that might begin a registered value are held back until the next
/// read settles them, which keeps a value split across reads or lines from
/// leaking. Returns the number of bytes written.
pub async fn copy_redacted<R, W>(reader: R, mut writer: W, redactor: &Redactor) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();
    let mut written = 0u64;

    loop {
        let read = {
            let chunk = reader.fill_buf().await?;
            pending.extend_from_slice(chunk);
            chunk.len()
        };
        if read == 0 {
            break;
        }
        reader.consume(read);

        let masked = redactor.mask_bytes(&pending);
        let held = redactor.partial_suffix_len(&masked);
        let (ready, rest) = masked.split_at(masked.len() - held);
        if !ready.is_empty() {
            writer.write_all(ready).await?;
            writer.flush().await?;
            written += ready.len() as u64;
        }
        pending = rest.to_vec();
    }

    let masked = redactor.mask_bytes(&pending);
    writer.write_all(&masked).await?;
    writer.flush().await?;
    Ok(written + masked.len() as u64)
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("registered", &self.len())
            .finish()
    }
}

/// [`MakeWriter`] that masks registered secrets in everything written.
pub struct RedactingMakeWriter<M> {
    inner: M,
    redactor: Redactor,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, redactor: Redactor) -> Self {
        Self { inner, redactor }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            redactor: &self.redactor,
            buf: Vec::new(),
        }
    }
}

/// Buffers one record and writes it masked on flush or drop.
///
/// Buffering keeps a secret that arrives across several `write` calls from
/// slipping through unmasked.
pub struct RedactingWriter<'a, W: Write> {
    inner: W,
    redactor: &'a Redactor,
    buf: Vec<u8>,
}

impl<W: Write> RedactingWriter<'_, W> {
    fn emit(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&buf);
        let masked = self.redactor.mask(&text);
        self.inner.write_all(masked.as_bytes())
    }
}

impl<W: Write> Write for RedactingWriter<'_, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for RedactingWriter<'_, W> {
    fn drop(&mut self) {
        let _ = self.emit();
    }
}
