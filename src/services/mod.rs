pub mod cluster;
pub mod k3s;
pub mod manifests;

use std::fmt;
use std::time::Duration;

/// Outcome of a bounded readiness wait. Not observing readiness is a warning, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotObserved { waited: Duration },
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Ready => f.write_str("ready"),
            Readiness::NotObserved { waited } => {
                write!(f, "not observed ready within {}s", waited.as_secs())
            }
        }
    }
}
