use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::entities::{MapStyle, TravelProfile};
use crate::error::{invalid_input_error, Error};

#[derive(Clone, Debug)]
pub struct Config {
    pub osrm_api_base: String,
    pub route_profile: TravelProfile,
    /// Deadline for one routing request; past it the request counts as failed.
    pub route_timeout: Duration,
    pub auth_api_base: String,
    pub listen_addr: SocketAddr,
    pub style: MapStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osrm_api_base: "router.project-osrm.org".into(),
            route_profile: TravelProfile::Driving,
            route_timeout: Duration::from_secs(10),
            auth_api_base: "http://localhost:8080".into(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            style: MapStyle::default(),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and the process environment. Unset variables keep
    /// their default.
    #[tracing::instrument(name = "Config::from_env")]
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let mut style = defaults.style;

        if let Some(delay) = parse_var::<u64>("OVERLAY_DELAY_MS")? {
            style.overlay_delay = Duration::from_millis(delay);
        }

        if let Some(padding) = parse_var::<f64>("FIT_PADDING")? {
            if !padding.is_finite() || padding < 0.0 {
                return Err(invalid_input_error());
            }
            style.fit_padding = padding;
        }

        let route_timeout = match parse_var::<u64>("ROUTE_TIMEOUT_MS")? {
            Some(0) => return Err(invalid_input_error()),
            Some(timeout) => Duration::from_millis(timeout),
            None => defaults.route_timeout,
        };

        Ok(Self {
            osrm_api_base: var_or("OSRM_API_BASE", defaults.osrm_api_base)?,
            route_profile: parse_var("ROUTE_PROFILE")?.unwrap_or(defaults.route_profile),
            route_timeout,
            auth_api_base: var_or("AUTH_API_BASE", defaults.auth_api_base)?,
            listen_addr: parse_var("LISTEN_ADDR")?.unwrap_or(defaults.listen_addr),
            style,
        })
    }
}

fn var_or(key: &str, default: String) -> Result<String, Error> {
    match env::var(key) {
        Ok(value) => Ok(value),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err.into()),
    }
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>, Error> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid_input_error()),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[test]
fn parse_var_test() {
    env::set_var("RIDESHAREX_TEST_DELAY", "250");
    assert_eq!(parse_var::<u64>("RIDESHAREX_TEST_DELAY").unwrap(), Some(250));

    env::set_var("RIDESHAREX_TEST_DELAY", "soon");
    assert!(parse_var::<u64>("RIDESHAREX_TEST_DELAY")
        .unwrap_err()
        .is_invalid_input_error());

    env::remove_var("RIDESHAREX_TEST_DELAY");
    assert_eq!(parse_var::<u64>("RIDESHAREX_TEST_DELAY").unwrap(), None);
    assert_eq!(var_or("RIDESHAREX_TEST_DELAY", "x".into()).unwrap(), "x");
}
