//! Record decoding
//!
//! Every candidate line maps to exactly one outcome: a [`Record`], an empty
//! line, or a malformed line. Nothing here fails the pipeline; callers log
//! the outcome and move on to the next line.
//!
//! `tshark -T json` pretty-prints an array of objects, so most of its lines
//! (`[`, `  {`, `"_index": ...`, `  },`) are fragments. Those come back as
//! [`Malformed::Incomplete`] or [`Malformed::Syntax`] and are not
//! reassembled. `tshark -T ek` writes one object per line and decodes cleanly.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use serde_json::{Map, Value};

/// One decoded capture record
///
/// Field sets vary by protocol, so the record stays a schema-less ordered
/// JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Wrap an already-parsed JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Unwrap into the underlying JSON object
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Record {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Why a line did not decode to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Line is empty or whitespace only
    Empty,
    /// Line is not a complete JSON object
    Malformed(Malformed),
}

/// Classification of a malformed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    /// Line is not valid UTF-8
    InvalidUtf8,
    /// Input ended mid-value, typically one line of a pretty-printed object
    Incomplete,
    /// Structurally invalid JSON
    Syntax(String),
    /// Valid JSON, but not an object
    NotAnObject,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformed::InvalidUtf8 => write!(f, "invalid UTF-8"),
            Malformed::Incomplete => write!(f, "incomplete JSON value"),
            Malformed::Syntax(msg) => write!(f, "syntax error: {}", msg),
            Malformed::NotAnObject => write!(f, "JSON value is not an object"),
        }
    }
}

/// Decode one candidate line
pub fn decode(line: &[u8]) -> Result<Record, DecodeOutcome> {
    let text = std::str::from_utf8(line)
        .map_err(|_| DecodeOutcome::Malformed(Malformed::InvalidUtf8))?;
    let text = text.trim();

    if text.is_empty() {
        return Err(DecodeOutcome::Empty);
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => Ok(Record(fields)),
        Ok(_) => Err(DecodeOutcome::Malformed(Malformed::NotAnObject)),
        Err(e) if e.classify() == Category::Eof => {
            Err(DecodeOutcome::Malformed(Malformed::Incomplete))
        }
        Err(e) => Err(DecodeOutcome::Malformed(Malformed::Syntax(e.to_string()))),
    }
}
