use std::f64::consts::PI;

use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub center: Coordinates,
    pub zoom: f64,
}

impl Camera {
    pub fn new(center: Coordinates, zoom: f64) -> Self {
        Self { center, zoom }
    }

    /// Frames `bounds` inside `viewport` leaving `padding` pixels on every side. Zoom
    /// snaps down to whole levels and never exceeds `max_zoom`.
    pub fn fit(bounds: Rect<f64>, padding: f64, viewport: Viewport, max_zoom: f64) -> Self {
        let min = project(bounds.min());
        let max = project(bounds.max());

        let center = unproject(Coord {
            x: (min.x + max.x) / 2.0,
            y: (min.y + max.y) / 2.0,
        });

        let width = (viewport.width - 2.0 * padding).max(1.0);
        let height = (viewport.height - 2.0 * padding).max(1.0);

        let span_x = (max.x - min.x).abs();
        let span_y = (max.y - min.y).abs();

        let zoom_for = |available: f64, span: f64| {
            if span <= f64::EPSILON {
                f64::INFINITY
            } else {
                (available / (TILE_SIZE * span)).log2()
            }
        };

        let zoom = zoom_for(width, span_x)
            .min(zoom_for(height, span_y))
            .floor()
            .clamp(0.0, max_zoom);

        Self { center, zoom }
    }
}

/// Web Mercator, normalized to the unit square (y grows southwards).
fn project(coord: Coord<f64>) -> Coord<f64> {
    let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    Coord {
        x: (coord.x + 180.0) / 360.0,
        y: (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0,
    }
}

fn unproject(coord: Coord<f64>) -> Coordinates {
    let lat = (PI * (1.0 - 2.0 * coord.y)).sinh().atan().to_degrees();

    Coordinates {
        lat,
        lng: coord.x * 360.0 - 180.0,
    }
}

#[test]
fn fit_two_points_test() {
    use crate::entities::bounding_rect;

    let airport = Coordinates { lat: 23.8513, lng: 90.4061 };
    let gulshan = Coordinates { lat: 23.7925, lng: 90.4078 };
    let viewport = Viewport { width: 800.0, height: 600.0 };

    let rect = bounding_rect(&[airport, gulshan]).unwrap();
    let camera = Camera::fit(rect, 50.0, viewport, 18.0);

    assert!(camera.center.lat < airport.lat && camera.center.lat > gulshan.lat);
    assert!(camera.center.lng > airport.lng && camera.center.lng < gulshan.lng);
    assert_eq!(camera.zoom.fract(), 0.0);

    // the framed span must fit inside the padded viewport at the chosen zoom
    let scale = TILE_SIZE * 2f64.powf(camera.zoom);
    let span_y = (project(rect.min()).y - project(rect.max()).y).abs() * scale;
    assert!(span_y <= 500.0);

    // one level deeper it would not
    assert!(span_y * 2.0 > 500.0);
}

#[test]
fn fit_single_point_test() {
    use crate::entities::bounding_rect;

    let airport = Coordinates { lat: 23.8513, lng: 90.4061 };
    let viewport = Viewport { width: 800.0, height: 600.0 };

    let camera = Camera::fit(bounding_rect(&[airport]).unwrap(), 50.0, viewport, 18.0);

    assert_eq!(camera.zoom, 18.0);
    assert!((camera.center.lat - airport.lat).abs() < 1e-9);
    assert!((camera.center.lng - airport.lng).abs() < 1e-9);
}
