//! Domain model: limits, dimensions, verdicts, and the sliding-window
//! accounting that admission decisions are made against.

mod limits;
mod verdict;
mod window;

pub use limits::{CredentialLimits, Dimension};
pub use verdict::{AdmissionGrant, AdmissionRequest, AdmissionVerdict, WindowUsage};
pub use window::SlidingWindow;
