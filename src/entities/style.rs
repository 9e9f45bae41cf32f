use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::{Camera, Coordinates};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Icon {
    Dot { color: String, size: u32 },
    Image { url: String, size: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub position: Coordinates,
    pub icon: Icon,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathStyle {
    pub color: String,
    pub opacity: f64,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
}

/// Visual configuration handed to every session at open time.
#[derive(Clone, Debug)]
pub struct MapStyle {
    pub initial_camera: Camera,
    pub max_zoom: f64,
    pub tiles: TileLayer,
    pub pickup_icon: Icon,
    pub dropoff_icon: Icon,
    pub path: PathStyle,
    pub default_pickup: String,
    pub default_dropoff: String,
    pub fit_padding: f64,
    pub overlay_delay: Duration,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            initial_camera: Camera::new(
                Coordinates {
                    lat: 23.8103,
                    lng: 90.4125,
                },
                13.0,
            ),
            max_zoom: 18.0,
            tiles: TileLayer {
                url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".into(),
                attribution: "© OpenStreetMap contributors".into(),
            },
            pickup_icon: Icon::Dot {
                color: "#4CAF50".into(),
                size: 20,
            },
            dropoff_icon: Icon::Dot {
                color: "#f44336".into(),
                size: 20,
            },
            path: PathStyle {
                color: "black".into(),
                opacity: 0.8,
                weight: 4.0,
            },
            default_pickup: "Airport".into(),
            default_dropoff: "Gulshan".into(),
            fit_padding: 50.0,
            overlay_delay: Duration::from_millis(100),
        }
    }
}

pub fn pickup_label(name: &str) -> String {
    format!("Pickup: {}", name)
}

pub fn dropoff_label(name: &str) -> String {
    format!("Dropoff: {}", name)
}
