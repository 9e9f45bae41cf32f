use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelProfile {
    Driving,
    Walking,
    Cycling,
}

impl TravelProfile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Cycling => "cycling",
        }
    }
}

impl Default for TravelProfile {
    fn default() -> Self {
        Self::Driving
    }
}

impl fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TravelProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driving" => Ok(Self::Driving),
            "walking" => Ok(Self::Walking),
            "cycling" => Ok(Self::Cycling),
            _ => Err(invalid_input_error()),
        }
    }
}

#[test]
fn profile_from_str_test() {
    assert_eq!("driving".parse::<TravelProfile>().unwrap(), TravelProfile::Driving);
    assert!("teleport".parse::<TravelProfile>().is_err());
}
