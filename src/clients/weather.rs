//! Current conditions for weather personas, from an Open-Meteo compatible forecast API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::{CityConfig, PlatformConfig, WeatherConfig};
use crate::error::{ClientError, ClientErrorKind, ClientResult};
use crate::models::WeatherReport;

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, city: &CityConfig) -> ClientResult<WeatherReport>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentBlock,
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: u32,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
}

/// WMO weather interpretation code to a short human condition
pub fn describe_weather_code(code: u32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 => "Rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 | 73 => "Snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unsettled",
    }
}

impl ForecastResponse {
    fn into_report(self, city: &CityConfig) -> ClientResult<WeatherReport> {
        let high = self.daily.temperature_2m_max.first().copied();
        let low = self.daily.temperature_2m_min.first().copied();
        let (Some(high), Some(low)) = (high, low) else {
            return Err(ClientError::new(
                ClientErrorKind::Decode,
                "current_weather",
                "forecast has no daily range",
            ));
        };
        Ok(WeatherReport {
            city: city.name.clone(),
            state: city.state.clone(),
            temp_f: self.current.temperature_2m.round() as i64,
            feels_like_f: self.current.apparent_temperature.round() as i64,
            condition: describe_weather_code(self.current.weather_code).to_string(),
            wind_mph: self.current.wind_speed_10m.round() as i64,
            humidity: self.current.relative_humidity_2m.round() as i64,
            daily_high_f: high.round() as i64,
            daily_low_f: low.round() as i64,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoWeatherSource {
    api_url: String,
    http: Client,
}

impl OpenMeteoWeatherSource {
    pub fn from_config(platform: &PlatformConfig, weather: &WeatherConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(platform.connect_timeout())
            .timeout(platform.request_timeout())
            .user_agent(platform.user_agent.clone())
            .build()
            .map_err(|e| ClientError::from_reqwest("build_client", e))?;
        Ok(Self {
            api_url: weather.api_url.clone(),
            http,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoWeatherSource {
    async fn current(&self, city: &CityConfig) -> ClientResult<WeatherReport> {
        let operation = "current_weather";
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("latitude", city.latitude.to_string()),
                ("longitude", city.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,weather_code"
                        .to_string(),
                ),
                ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::status(operation, status.as_u16(), "forecast request failed"));
        }
        let forecast = response
            .json::<ForecastResponse>()
            .await
            .map_err(|e| ClientError::new(ClientErrorKind::Decode, operation, e.to_string()))?;
        forecast.into_report(city)
    }
}
