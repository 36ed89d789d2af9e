// Application layer - Use cases and capability traits
pub mod completion;
pub mod forecast;
pub mod forecast_service;
pub mod live_forecast_service;
pub mod reading_repository;
pub mod reading_simulator;
pub mod sensor_service;
