use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    api::RoutingService,
    entities::{Coordinates, TravelProfile},
    error::{invalid_input_error, upstream_error, Error},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Geometry {
    /// `[lng, lat]` pairs.
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub geometry: Geometry,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Response {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
}

#[tracing::instrument]
pub async fn find_route(
    api_base: &str,
    from: Coordinates,
    to: Coordinates,
    profile: TravelProfile,
    timeout: Duration,
) -> Result<Route, Error> {
    let url = format!(
        "https://{}/route/v1/{}/{},{};{},{}",
        api_base,
        profile.name(),
        from.lng,
        from.lat,
        to.lng,
        to.lat
    );

    let res = reqwest::Client::new()
        .get(url)
        .timeout(timeout)
        .query(&[("overview", "full")])
        .query(&[("geometries", "geojson")])
        .send()
        .await?;

    let status_code = res.status().as_u16();

    if status_code >= 400 && status_code < 500 {
        return Err(invalid_input_error());
    } else if status_code != 200 {
        return Err(upstream_error());
    }

    let data: Response = res.json().await?;

    first_route(data)
}

fn first_route(data: Response) -> Result<Route, Error> {
    if data.code != "Ok" {
        tracing::warn!(
            "osrm answered {}: {}",
            data.code,
            data.message.unwrap_or_default()
        );
        return Err(upstream_error());
    }

    data.routes.into_iter().next().ok_or_else(upstream_error)
}

fn waypoints(route: Route) -> Result<Vec<Coordinates>, Error> {
    route
        .geometry
        .coordinates
        .into_iter()
        .map(|[lng, lat]| Coordinates::new(lat, lng).map_err(|_| upstream_error()))
        .collect()
}

/// Road routing against an OSRM server.
#[derive(Clone, Debug)]
pub struct OsrmClient {
    api_base: String,
    timeout: Duration,
}

impl OsrmClient {
    pub fn new(api_base: String, timeout: Duration) -> Self {
        Self { api_base, timeout }
    }
}

#[async_trait]
impl RoutingService for OsrmClient {
    async fn route(
        &self,
        from: Coordinates,
        to: Coordinates,
        profile: TravelProfile,
    ) -> Result<Vec<Coordinates>, Error> {
        let route = find_route(&self.api_base, from, to, profile, self.timeout).await?;

        tracing::debug!(
            "route of {:.0} m, {:.0} s",
            route.distance,
            route.duration
        );

        waypoints(route)
    }
}

#[test]
fn parse_response_test() {
    let data: Response = serde_json::from_str(
        r#"{
            "code": "Ok",
            "routes": [{
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[90.4078, 23.7925], [90.41, 23.81], [90.4061, 23.8513]]
                },
                "distance": 7311.2,
                "duration": 812.4,
                "legs": []
            }],
            "waypoints": []
        }"#,
    )
    .unwrap();

    let path = waypoints(first_route(data).unwrap()).unwrap();

    assert_eq!(
        path,
        vec![
            Coordinates { lat: 23.7925, lng: 90.4078 },
            Coordinates { lat: 23.81, lng: 90.41 },
            Coordinates { lat: 23.8513, lng: 90.4061 },
        ]
    );
}

#[test]
fn parse_no_route_test() {
    let data: Response =
        serde_json::from_str(r#"{"code": "NoRoute", "message": "Impossible route between points"}"#)
            .unwrap();
    assert_eq!(first_route(data).unwrap_err().code, 4);

    let data: Response = serde_json::from_str(r#"{"code": "Ok", "routes": []}"#).unwrap();
    assert_eq!(first_route(data).unwrap_err().code, 4);
}
