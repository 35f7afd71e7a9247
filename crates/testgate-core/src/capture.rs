//! Output capture scope
//!
//! Units never print to the process streams directly; they write to an
//! [`OutputSinks`] value handed to them. A capture scope swaps those sinks for
//! in-memory buffers and puts the originals back when the scope ends, even if
//! the block panics.

use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// A boxed output stream
pub type Sink = Box<dyn Write + Send>;

/// The standard output and error streams seen by running code
pub struct OutputSinks {
    out: Sink,
    err: Sink,
}

impl OutputSinks {
    /// Sinks writing to the real process stdout and stderr
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Sinks writing to arbitrary streams
    pub fn new(out: Sink, err: Sink) -> Self {
        Self { out, err }
    }

    /// Standard output
    pub fn out(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    /// Standard error
    pub fn err(&mut self) -> &mut dyn Write {
        &mut self.err
    }
}

impl Default for OutputSinks {
    fn default() -> Self {
        Self::stdio()
    }
}

impl fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSinks").finish_non_exhaustive()
    }
}

/// Cloneable in-memory buffer implementing [`Write`]
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer contents as text (lossy UTF-8)
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Text captured by a scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    /// True when nothing was written to either stream
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Active capture; restores the original sinks when dropped
pub struct CaptureGuard<'a> {
    sinks: &'a mut OutputSinks,
    saved: Option<(Sink, Sink)>,
    out: SharedBuffer,
    err: SharedBuffer,
}

impl<'a> CaptureGuard<'a> {
    /// Swap both sinks for fresh buffers
    pub fn enter(sinks: &'a mut OutputSinks) -> Self {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let saved_out = std::mem::replace(&mut sinks.out, Box::new(out.clone()));
        let saved_err = std::mem::replace(&mut sinks.err, Box::new(err.clone()));

        Self {
            sinks,
            saved: Some((saved_out, saved_err)),
            out,
            err,
        }
    }

    /// The redirected sinks
    pub fn sinks(&mut self) -> &mut OutputSinks {
        &mut *self.sinks
    }

    /// Everything captured so far
    pub fn captured(&self) -> Captured {
        Captured {
            stdout: self.out.contents(),
            stderr: self.err.contents(),
        }
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if let Some((out, err)) = self.saved.take() {
            self.sinks.out = out;
            self.sinks.err = err;
        }
    }
}

/// Run `block` with both sinks redirected to memory
///
/// The original sinks are back in place when this returns or unwinds; a
/// panic inside `block` is propagated unchanged.
pub fn with_captured_output<T>(
    sinks: &mut OutputSinks,
    block: impl FnOnce(&mut OutputSinks) -> T,
) -> (T, Captured) {
    let mut guard = CaptureGuard::enter(sinks);
    let value = block(guard.sinks());
    let captured = guard.captured();
    drop(guard);
    (value, captured)
}
