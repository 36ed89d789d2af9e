// Application state for HTTP handlers
use crate::application::forecast_service::ForecastService;
use crate::application::live_forecast_service::LiveForecastService;
use crate::application::sensor_service::SensorService;

#[derive(Clone)]
pub struct AppState {
    pub sensor_service: SensorService,
    pub forecast_service: ForecastService,
    pub live_forecast_service: LiveForecastService,
}
