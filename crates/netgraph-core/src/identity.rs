//! Node identities.
//!
//! A graph identifies its nodes either by 64-bit integers or by short text
//! codes, never both. The kind is decided once, from the value types found
//! in the FromNode/ToNode columns, and every identity observed afterwards
//! must share it.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// Longest text code kept, in bytes. Longer codes are truncated.
pub const MAX_CODE_BYTES: usize = 31;

/// Which of the two identity schemes a graph uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Integer,
    Code,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("INTEGER id"),
            Self::Code => f.write_str("TEXT code"),
        }
    }
}

/// The identity of a single graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum NodeIdentity {
    Integer(i64),
    Code(String),
}

impl NodeIdentity {
    #[must_use]
    pub const fn integer(id: i64) -> Self {
        Self::Integer(id)
    }

    /// Build a text identity, truncating to [`MAX_CODE_BYTES`].
    ///
    /// Truncation backs off to the nearest UTF-8 character boundary so the
    /// stored code is always valid text.
    #[must_use]
    pub fn code(code: &str) -> Self {
        Self::Code(truncate_code(code).to_owned())
    }

    #[must_use]
    pub const fn kind(&self) -> IdentityKind {
        match self {
            Self::Integer(_) => IdentityKind::Integer,
            Self::Code(_) => IdentityKind::Code,
        }
    }

    /// Bytes needed to store this code with its terminating NUL.
    ///
    /// Integer identities report zero; their width is fixed at 8 bytes.
    #[must_use]
    pub fn encoded_code_len(&self) -> usize {
        match self {
            Self::Integer(_) => 0,
            Self::Code(code) => code.len() + 1,
        }
    }
}

impl PartialOrd for NodeIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeIdentity {
    /// Integers order numerically, codes byte-lexicographically. Integers
    /// sort before codes; a single graph never holds both.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Code(a), Self::Code(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Integer(_), Self::Code(_)) => Ordering::Less,
            (Self::Code(_), Self::Integer(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Code(code) => f.write_str(code),
        }
    }
}

fn truncate_code(code: &str) -> &str {
    if code.len() <= MAX_CODE_BYTES {
        return code;
    }
    let mut end = MAX_CODE_BYTES;
    while !code.is_char_boundary(end) {
        end -= 1;
    }
    &code[..end]
}
