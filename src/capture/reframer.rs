//! Newline reframing of the capture byte stream
//!
//! The capture tool writes one record per line, but reads from its pipe land
//! at arbitrary offsets. [`LineReframer`] keeps the unterminated tail of the
//! stream between reads and hands out complete lines as they close:
//!
//! ```text
//!   read 1: {"a":1}\n{"a":      -> yields {"a":1}      buffer: {"a":
//!   read 2: 2}\n                -> yields {"a":2}      buffer: (empty)
//! ```
//!
//! Lines are split off the buffer as `Bytes` without copying.
//!
//! The buffer is capped at `max_line_len`. A line that outgrows the cap is
//! handled according to [`OverflowPolicy`].

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Line delimiter used by the capture tool
pub const DELIMITER: u8 = b'\n';

/// What to do when an unterminated line exceeds the configured maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oversized fragment, skip to the next delimiter and resume
    #[default]
    DiscardAndResync,
    /// Report the overflow and stop producing lines
    Fail,
}

/// Reframing error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// An unterminated line grew past the configured maximum
    #[error("line exceeded {max} bytes ({discarded} bytes discarded)")]
    Overflow {
        /// Configured maximum line length
        max: usize,
        /// Bytes dropped from the buffer
        discarded: usize,
    },
}

/// Splits a byte stream into delimiter-terminated lines
#[derive(Debug)]
pub struct LineReframer {
    buf: BytesMut,
    /// Prefix of `buf` already searched for a delimiter
    scanned: usize,
    max_line_len: usize,
    policy: OverflowPolicy,
    /// Skipping the rest of an oversized line
    resyncing: bool,
    /// Stopped after an overflow under `OverflowPolicy::Fail`
    failed: bool,
}

impl LineReframer {
    /// Create a reframer with the given line cap and overflow policy
    pub fn new(max_line_len: usize, policy: OverflowPolicy) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line_len: max_line_len.max(1),
            policy,
            resyncing: false,
            failed: false,
        }
    }

    /// Append a chunk and return the lines it completes
    ///
    /// The returned iterator is lazy: lines are split off the buffer as it
    /// is advanced. Lines left unread stay buffered and come out first on
    /// the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        if !self.failed {
            self.buf.extend_from_slice(chunk);
        }
        Lines { reframer: self }
    }

    /// Bytes received but not yet terminated by a delimiter
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Whether the reframer stopped after an overflow
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Consume the reframer, returning the unterminated tail
    pub fn into_remainder(self) -> Bytes {
        self.buf.freeze()
    }

    fn next_line(&mut self) -> Option<Result<Bytes, FrameError>> {
        loop {
            if self.failed {
                return None;
            }

            let found = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == DELIMITER)
                .map(|offset| self.scanned + offset);

            if let Some(pos) = found {
                let mut line = self.buf.split_to(pos + 1);
                self.scanned = 0;
                if self.resyncing {
                    // tail of an oversized line
                    self.resyncing = false;
                    continue;
                }
                if pos > self.max_line_len {
                    // oversized line that arrived terminated in a single read
                    if self.policy == OverflowPolicy::Fail {
                        self.fail();
                    }
                    return Some(Err(self.overflow(pos)));
                }
                line.truncate(pos);
                return Some(Ok(line.freeze()));
            }

            self.scanned = self.buf.len();
            if self.buf.len() <= self.max_line_len {
                return None;
            }

            let discarded = self.buf.len();
            self.buf.clear();
            self.scanned = 0;

            match self.policy {
                OverflowPolicy::DiscardAndResync => {
                    if self.resyncing {
                        // already reported for this line
                        return None;
                    }
                    self.resyncing = true;
                }
                OverflowPolicy::Fail => self.fail(),
            }

            return Some(Err(self.overflow(discarded)));
        }
    }

    fn fail(&mut self) {
        self.failed = true;
        self.buf.clear();
        self.scanned = 0;
    }

    fn overflow(&self, discarded: usize) -> FrameError {
        FrameError::Overflow {
            max: self.max_line_len,
            discarded,
        }
    }
}

/// Lines completed by one [`LineReframer::feed`] call
#[derive(Debug)]
pub struct Lines<'a> {
    reframer: &'a mut LineReframer,
}

impl Lines<'_> {
    /// Whether the reframer stopped after an overflow
    pub fn is_failed(&self) -> bool {
        self.reframer.failed
    }
}

impl Iterator for Lines<'_> {
    type Item = Result<Bytes, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reframer.next_line()
    }
}
