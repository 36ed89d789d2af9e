// Temperature sensor domain model
use super::reading::Reading;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensor {
    pub id: String,
    pub name: String,
}

impl Sensor {
    pub fn new(id: String) -> Self {
        let name = Self::format_name(&id);
        Self { id, name }
    }

    fn format_name(id: &str) -> String {
        // "north_reef_" -> "north reef"
        id.trim_end_matches(['_', '-']).replace(['_', '-'], " ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorHistory {
    #[serde(flatten)]
    pub sensor: Sensor,
    pub readings: Vec<Reading>,
}

impl SensorHistory {
    pub fn new(sensor: Sensor, readings: Vec<Reading>) -> Self {
        Self { sensor, readings }
    }
}
