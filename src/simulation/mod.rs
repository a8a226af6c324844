pub mod states;
pub mod params;
pub mod forces;
pub mod integrator;
pub mod trajectory;
pub mod scenario;
pub mod analysis;
