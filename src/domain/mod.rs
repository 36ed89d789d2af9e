// Domain layer - Plain data models
pub mod reading;
pub mod sensor;
