use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use shared::Coordinate;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_ROUTER_URL: &str = "https://router.project-osrm.org/route/v1/driving";
pub const DEFAULT_STATION_MIRRORS: [&str; 2] = [
    "https://lz4.overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
];
pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_ADVISOR_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ADVISOR_MODEL: &str = "gemini-2.5-flash";
/// Lisbon, used whenever the device cannot report a position.
pub const FALLBACK_LOCATION: Coordinate = Coordinate::new(38.7223, -9.1393);
/// Slightly above the 15s budget the station query asks the server for.
pub const DEFAULT_STATION_DEADLINE: Duration = Duration::from_secs(20);
pub const MAP_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must list at least one mirror")]
    NoMirrors(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub geocoder_url: String,
    pub geocoder_email: Option<String>,
    pub router_url: String,
    pub station_mirrors: Vec<String>,
    pub weather_url: String,
    pub advisor_url: String,
    pub advisor_model: String,
    /// Grounding service key; canned advice when unset.
    pub advisor_api_key: Option<String>,
    pub fallback_location: Coordinate,
    /// Client-side deadline per mirror request; `None` waits on the server.
    pub station_deadline: Option<Duration>,
    /// Position reported by the device, `None` behaves like a denied permission.
    pub device_location: Option<Coordinate>,
    pub map_settle: Duration,
    /// Sessions untouched this long are ended.
    pub session_idle_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_email: None,
            router_url: DEFAULT_ROUTER_URL.to_string(),
            station_mirrors: DEFAULT_STATION_MIRRORS.iter().map(|m| m.to_string()).collect(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            advisor_url: DEFAULT_ADVISOR_URL.to_string(),
            advisor_model: DEFAULT_ADVISOR_MODEL.to_string(),
            advisor_api_key: None,
            fallback_location: FALLBACK_LOCATION,
            station_deadline: Some(DEFAULT_STATION_DEADLINE),
            device_location: None,
            map_settle: MAP_SETTLE_DELAY,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for every unset key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("GREENPATH_BIND") {
            config.bind = parse("GREENPATH_BIND", &raw)?;
        }
        if let Some(url) = lookup("GREENPATH_GEOCODER_URL") {
            config.geocoder_url = url;
        }
        config.geocoder_email = lookup("GREENPATH_GEOCODER_EMAIL").filter(|e| !e.is_empty());
        if let Some(url) = lookup("GREENPATH_ROUTER_URL") {
            config.router_url = url;
        }
        if let Some(raw) = lookup("GREENPATH_STATION_MIRRORS") {
            config.station_mirrors = parse_mirrors(&raw)?;
        }
        if let Some(url) = lookup("GREENPATH_WEATHER_URL") {
            config.weather_url = url;
        }
        if let Some(url) = lookup("GREENPATH_ADVISOR_URL") {
            config.advisor_url = url;
        }
        if let Some(model) = lookup("GREENPATH_ADVISOR_MODEL") {
            config.advisor_model = model;
        }
        config.advisor_api_key =
            lookup("GREENPATH_ADVISOR_API_KEY").filter(|key| !key.trim().is_empty());

        let fallback_lat = lookup("GREENPATH_FALLBACK_LAT")
            .map(|raw| parse::<f64>("GREENPATH_FALLBACK_LAT", &raw))
            .transpose()?;
        let fallback_lng = lookup("GREENPATH_FALLBACK_LNG")
            .map(|raw| parse::<f64>("GREENPATH_FALLBACK_LNG", &raw))
            .transpose()?;
        config.fallback_location = Coordinate::new(
            fallback_lat.unwrap_or(FALLBACK_LOCATION.lat),
            fallback_lng.unwrap_or(FALLBACK_LOCATION.lng),
        );

        if let Some(raw) = lookup("GREENPATH_STATION_DEADLINE_SECS") {
            let secs: u64 = parse("GREENPATH_STATION_DEADLINE_SECS", &raw)?;
            // 0 disables the client-side deadline.
            config.station_deadline = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup("GREENPATH_SESSION_IDLE_SECS") {
            let secs: u64 = parse("GREENPATH_SESSION_IDLE_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    name: "GREENPATH_SESSION_IDLE_SECS",
                    value: raw,
                });
            }
            config.session_idle_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("GREENPATH_DEVICE_LOCATION") {
            config.device_location = Some(parse_coordinate("GREENPATH_DEVICE_LOCATION", &raw)?);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_mirrors(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mirrors: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if mirrors.is_empty() {
        return Err(ConfigError::NoMirrors("GREENPATH_STATION_MIRRORS"));
    }
    Ok(mirrors)
}

/// Parses `lat,lng`.
pub fn parse_coordinate(name: &'static str, raw: &str) -> Result<Coordinate, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name,
        value: raw.to_string(),
    };
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok(Coordinate::new(lat, lng))
}
