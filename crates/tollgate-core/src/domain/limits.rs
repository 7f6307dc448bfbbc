use serde::{Deserialize, Serialize};

/// Per-credential limit triple, applied over one sliding window.
///
/// A limit of zero switches the dimension off entirely: every request is
/// denied on it, regardless of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialLimits {
    /// Requests admitted per window.
    pub rpm: u64,
    /// Input tokens admitted per window.
    pub input_tpm: u64,
    /// Output tokens admitted per window.
    pub output_tpm: u64,
}

impl CredentialLimits {
    pub fn limit_for(&self, dimension: Dimension) -> u64 {
        match dimension {
            Dimension::Req => self.rpm,
            Dimension::In => self.input_tpm,
            Dimension::Out => self.output_tpm,
        }
    }
}

/// The three capped dimensions.
///
/// Ordering matters: when several dimensions would overflow at once, the
/// first violating dimension in `ALL` order is the one reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Req,
    In,
    Out,
}

impl Dimension {
    /// Deny tie-break order.
    pub const ALL: [Dimension; 3] = [Dimension::Req, Dimension::In, Dimension::Out];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Req => "req",
            Dimension::In => "in",
            Dimension::Out => "out",
        }
    }

    /// Maps the numeric flag returned by the admission script (1-based,
    /// tie-break order) back to a dimension.
    pub fn from_flag(flag: i64) -> Option<Dimension> {
        match flag {
            1 => Some(Dimension::Req),
            2 => Some(Dimension::In),
            3 => Some(Dimension::Out),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
