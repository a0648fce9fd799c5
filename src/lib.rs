pub mod actions;
pub mod catalog;
pub mod dirty;
pub mod error;
pub mod grid;
pub mod model;
pub mod profit;
pub mod progression;
pub mod recompute;
pub mod scenario;
pub mod store;
pub mod web;

pub use actions::GameService;
pub use catalog::Catalog;
pub use error::{GameError, GameResult};
pub use scenario::{Scenario, ScenarioLoader};
