// Forecast engine and its strategies
pub mod engine;
pub mod holt;
pub mod language_model;
pub mod linear;
pub mod step;
pub mod strategy;

pub use engine::{forecast, Forecast, Forecaster};
pub use strategy::StrategyKind;
