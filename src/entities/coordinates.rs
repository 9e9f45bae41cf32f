use geo_types::{Coord, Point, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, Error> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(invalid_input_error());
        }

        Ok(Self { lat, lng })
    }
}

impl From<Coordinates> for Coord<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Coord {
            x: coordinates.lng,
            y: coordinates.lat,
        }
    }
}

impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.lng, coordinates.lat)
    }
}

impl From<Coord<f64>> for Coordinates {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lng: coord.x,
        }
    }
}

/// Smallest rectangle containing every coordinate, `None` for an empty slice.
pub fn bounding_rect(coordinates: &[Coordinates]) -> Option<Rect<f64>> {
    let (first, rest) = coordinates.split_first()?;
    let first: Coord<f64> = (*first).into();

    let (min, max) = rest.iter().fold((first, first), |(min, max), c| {
        let c: Coord<f64> = (*c).into();
        (
            Coord {
                x: min.x.min(c.x),
                y: min.y.min(c.y),
            },
            Coord {
                x: max.x.max(c.x),
                y: max.y.max(c.y),
            },
        )
    });

    Some(Rect::new(min, max))
}

#[test]
fn non_finite_coordinates_test() {
    assert!(Coordinates::new(23.8513, 90.4061).is_ok());
    assert!(Coordinates::new(f64::NAN, 90.4061).is_err());
    assert!(Coordinates::new(23.8513, f64::INFINITY).is_err());
}

#[test]
fn bounding_rect_test() {
    assert!(bounding_rect(&[]).is_none());

    let airport = Coordinates::new(23.8513, 90.4061).unwrap();
    let dhanmondi = Coordinates::new(23.7461, 90.3742).unwrap();

    let rect = bounding_rect(&[airport, dhanmondi]).unwrap();
    assert_eq!(rect.min(), Coord { x: 90.3742, y: 23.7461 });
    assert_eq!(rect.max(), Coord { x: 90.4061, y: 23.8513 });
}
