/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default prediction latitude when the caller omits one.
    pub location_lat: f64,
    /// Default prediction longitude when the caller omits one.
    pub location_lon: f64,
    /// Display name of the default location.
    pub location_name: String,
    /// Cache TTL for aurora readings, in seconds.
    pub cache_ttl_aurora_secs: u64,
    /// Cache TTL for weather readings, in seconds.
    pub cache_ttl_weather_secs: u64,
    /// Aurora source ids in fallback priority order.
    pub aurora_sources: Vec<String>,
    /// Weather source ids in fallback priority order.
    pub weather_sources: Vec<String>,
    /// User-Agent sent to the MET Norway API (required by their terms of service).
    pub metno_user_agent: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            location_lat: env_parse("LOCATION_LAT", 55.7),
            location_lon: env_parse("LOCATION_LON", 13.4),
            location_name: std::env::var("LOCATION_NAME")
                .unwrap_or_else(|_| "My Location".to_string()),
            cache_ttl_aurora_secs: env_parse("CACHE_TTL_AURORA_SECS", 300),
            cache_ttl_weather_secs: env_parse("CACHE_TTL_WEATHER_SECS", 1800),
            aurora_sources: env_list("AURORA_SOURCES", &["noaa_swpc", "auroras_live"]),
            weather_sources: env_list("WEATHER_SOURCES", &["met_no", "smhi", "open_meteo"]),
            metno_user_agent: std::env::var("METNO_USER_AGENT")
                .unwrap_or_else(|_| "AuroraVisibility/0.1 (contact@example.com)".to_string()),
            port: env_parse("PORT", 8080),
        }
    }
}

/// Parse an env var into T, falling back to `default` when unset or malformed.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{} has invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Parse a comma-separated env var into a list of source ids.
fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}
