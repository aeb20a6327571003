//! Reactive navigation: state machine, wall-centering trim, speed governor.

pub mod controller;
pub mod governor;
pub mod steering;
pub mod trend;

pub use controller::{NavState, NavigationController, TurnDirection};
pub use governor::SpeedGovernor;
pub use steering::{SteeringController, Trim};
pub use trend::FrontTrend;
