use serde::{Deserialize, Serialize};

/// * `name` - Weather name shown to the spectators
/// * `speed_multiplier` - Multiplier on the base speed of every horse
/// * `rain` - True if it is raining (horses with rain gear ignore the speed penalty)
/// * `track_condition` - Going, e.g. "Firm" or "Heavy"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub name: String,
    pub speed_multiplier: f64,
    #[serde(default)]
    pub rain: bool,
    #[serde(default = "default_track_condition")]
    pub track_condition: String,
}

fn default_track_condition() -> String {
    "Firm".to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherPreset {
    Sunny,
    Cloudy,
    Rain,
    HeavyRain,
}

impl WeatherPreset {
    pub const ALL: [WeatherPreset; 4] = [
        WeatherPreset::Sunny,
        WeatherPreset::Cloudy,
        WeatherPreset::Rain,
        WeatherPreset::HeavyRain,
    ];

    pub fn weather(&self) -> Weather {
        let (name, speed_multiplier, rain, track_condition) = match self {
            WeatherPreset::Sunny => ("Sunny", 1.0, false, "Firm"),
            WeatherPreset::Cloudy => ("Cloudy", 1.0, false, "Good"),
            WeatherPreset::Rain => ("Rain", 0.95, true, "Soft"),
            WeatherPreset::HeavyRain => ("Heavy Rain", 0.9, true, "Heavy"),
        };
        Weather {
            name: name.to_owned(),
            speed_multiplier,
            rain,
            track_condition: track_condition.to_owned(),
        }
    }
}

/// Weather can be given either by preset name or explicitly in the parameter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeatherPars {
    Preset(WeatherPreset),
    Custom(Weather),
}

impl WeatherPars {
    pub fn to_weather(&self) -> Weather {
        match self {
            WeatherPars::Preset(preset) => preset.weather(),
            WeatherPars::Custom(weather) => weather.to_owned(),
        }
    }
}

impl Default for WeatherPars {
    fn default() -> Self {
        WeatherPars::Preset(WeatherPreset::Sunny)
    }
}

impl Default for Weather {
    fn default() -> Self {
        WeatherPreset::Sunny.weather()
    }
}
