use serde::{Deserialize, Serialize};

/// Wall-clock fields the time and date pages render. Filled in by the
/// host; the core never talks to the OS clock so pages stay
/// deterministic under test.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClockReading {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day: u8,
    pub month: u8,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u8,
}

/// Outdoor conditions fetched by the (external) weather subsystem.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: f32,
    pub humidity: f32,
    pub wind_kph: f32,
}

/// Environment values shared with the page draw callbacks. The core
/// treats them as plain data; refreshing them is the host's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvReadings {
    pub indoor_temp: Option<f32>,
    pub indoor_hum: Option<f32>,
    pub weather: Option<WeatherReading>,
    pub clock: ClockReading,
}

impl EnvReadings {
    /// Accepts an indoor sensor sample after a plausibility check
    /// (temperature -40..80 °C, humidity 0..100 %). Implausible samples
    /// are rejected and the previous values are held, mirroring how a
    /// flaky DHT read is treated on the device.
    pub fn update_indoor(&mut self, temperature: f32, humidity: f32) -> bool {
        let plausible = temperature.is_finite()
            && humidity.is_finite()
            && (-40.0..=80.0).contains(&temperature)
            && (0.0..=100.0).contains(&humidity);
        if plausible {
            self.indoor_temp = Some(temperature);
            self.indoor_hum = Some(humidity);
        }
        plausible
    }
}
