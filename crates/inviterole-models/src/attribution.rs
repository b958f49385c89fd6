use std::collections::BTreeSet;
use std::fmt;

/// Which invite a join consumed, as far as the use-counters can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributionResult {
    Resolved(String),
    /// More than one counter moved between the two snapshots.
    Ambiguous(BTreeSet<String>),
    /// No counter moved, or there was no usable baseline.
    Unresolved,
}

impl fmt::Display for AttributionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(code) => write!(f, "resolved({code})"),
            Self::Ambiguous(codes) => {
                let joined: Vec<&str> = codes.iter().map(String::as_str).collect();
                write!(f, "ambiguous({})", joined.join(", "))
            }
            Self::Unresolved => f.write_str("unresolved"),
        }
    }
}
