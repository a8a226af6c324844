pub mod simulation;
pub mod configuration;
pub mod output;
pub mod benchmark;
pub mod error;

pub use simulation::states::{Body, BodyPair, Deviation, DeviationAxis, InitialConditions, LagrangePoint, NVec2, NVec4};
pub use simulation::params::RunParams;
pub use simulation::forces::{Derivative, DerivativeFunction, RestrictedThreeBody};
pub use simulation::integrator::{StepError, StepMethod, Stepper};
pub use simulation::trajectory::{run_trajectory, RunSummary, Sinks};
pub use simulation::scenario::Scenario;
pub use simulation::analysis::{DeviationAnalysis, ErrorAnalysis, MassAnalysis, SweepRange};

pub use configuration::config::{ConfigOverrides, LagrangePointConfig, ProgramConfig, ProgramControl, ProgramParams};

pub use output::writer::{OutputDir, TrajectoryFiles};

pub use benchmark::benchmark::{bench_steppers, Timer};

pub use error::{IntegrationFailure, SimError};
