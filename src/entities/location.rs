use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;
use crate::error::{invalid_input_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinates: Coordinates,
}

impl Location {
    pub fn new(name: String, coordinates: Coordinates) -> Self {
        Self { name, coordinates }
    }
}

/// Read-only set of named pickup/dropoff points. Names are unique; order is the order
/// the entries were supplied in.
#[derive(Clone, Debug, Serialize)]
pub struct LocationDirectory {
    locations: Vec<Location>,
}

impl LocationDirectory {
    pub fn new(locations: Vec<Location>) -> Result<Self, Error> {
        for (i, location) in locations.iter().enumerate() {
            if location.name.is_empty() {
                return Err(invalid_input_error());
            }

            if locations[..i].iter().any(|l| l.name == location.name) {
                return Err(invalid_input_error());
            }
        }

        Ok(Self { locations })
    }

    pub fn reference() -> Self {
        let entry = |name: &str, lat: f64, lng: f64| Location::new(name.into(), Coordinates { lat, lng });

        Self {
            locations: vec![
                entry("Airport", 23.8513, 90.4061),
                entry("Dhanmondi", 23.7461, 90.3742),
                entry("Gulshan", 23.7925, 90.4078),
                entry("Uttara", 23.8759, 90.3795),
                entry("Banani", 23.7937, 90.4066),
            ],
        }
    }

    /// `None` for empty or unknown names.
    pub fn resolve(&self, name: &str) -> Option<&Location> {
        if name.is_empty() {
            return None;
        }

        self.locations.iter().find(|l| l.name == name)
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[test]
fn reference_directory_test() {
    let directory = LocationDirectory::reference();

    assert_eq!(directory.len(), 5);
    assert_eq!(
        directory.resolve("Gulshan").unwrap().coordinates,
        Coordinates {
            lat: 23.7925,
            lng: 90.4078
        }
    );
    assert!(directory.resolve("").is_none());
    assert!(directory.resolve("Mirpur").is_none());
}

#[test]
fn duplicate_names_rejected_test() {
    let airport = Location::new("Airport".into(), Coordinates { lat: 0.0, lng: 0.0 });

    let result = LocationDirectory::new(vec![airport.clone(), airport]);
    assert!(result.unwrap_err().is_invalid_input_error());
}
