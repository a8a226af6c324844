//! Error types shared by the simulation core and the binary

use std::fmt;
use std::io;

use crate::simulation::integrator::StepError;

/// A run stopped because the stepper could not produce the next state
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationFailure {
    pub steps: u64, // steps completed before the failure
    pub t: f64,
    pub cause: StepError,
}

impl fmt::Display for IntegrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "integration failed after {} steps at t = {}: {}",
            self.steps, self.t, self.cause
        )
    }
}

impl std::error::Error for IntegrationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Errors surfaced by the analysis drivers and configuration layer
#[derive(Debug)]
pub enum SimError {
    Integration(IntegrationFailure),
    /// The L4 and L5 runs of an averaged sweep disagree in length
    InconsistentSweepLengths {
        what: String,
        first: usize,
        second: usize,
    },
    Config(String),
    Io(io::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Integration(e) => write!(f, "{}", e),
            SimError::InconsistentSweepLengths { what, first, second } => write!(
                f,
                "the two {} runs for different Lagrange points returned inconsistent data sets ({} vs {} points)",
                what, first, second
            ),
            SimError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            SimError::Io(e) => write!(f, "output error: {}", e),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Integration(e) => Some(e),
            SimError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IntegrationFailure> for SimError {
    fn from(e: IntegrationFailure) -> Self {
        SimError::Integration(e)
    }
}

impl From<io::Error> for SimError {
    fn from(e: io::Error) -> Self {
        SimError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
