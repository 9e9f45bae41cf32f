use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::LocationDirectory;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DateChoice {
    Today,
    Tomorrow,
    On { date: NaiveDate },
}

impl DateChoice {
    pub fn label(&self) -> String {
        match self {
            Self::Today => "Today".into(),
            Self::Tomorrow => "Tomorrow".into(),
            Self::On { date } => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl Default for DateChoice {
    fn default() -> Self {
        Self::Today
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum TimeChoice {
    Now,
    In15Minutes,
    In30Minutes,
    In45Minutes,
    In1Hour,
    At { time: NaiveTime },
}

impl TimeChoice {
    pub fn label(&self) -> String {
        match self {
            Self::Now => "Now".into(),
            Self::In15Minutes => "15 minutes".into(),
            Self::In30Minutes => "30 minutes".into(),
            Self::In45Minutes => "45 minutes".into(),
            Self::In1Hour => "1 hour".into(),
            Self::At { time } => time.format("%H:%M").to_string(),
        }
    }

    fn offset(&self) -> Option<Duration> {
        match self {
            Self::Now => Some(Duration::zero()),
            Self::In15Minutes => Some(Duration::minutes(15)),
            Self::In30Minutes => Some(Duration::minutes(30)),
            Self::In45Minutes => Some(Duration::minutes(45)),
            Self::In1Hour => Some(Duration::hours(1)),
            Self::At { time: _ } => None,
        }
    }
}

impl Default for TimeChoice {
    fn default() -> Self {
        Self::Now
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub pickup: String,
    pub dropoff: String,
    pub date: DateChoice,
    pub time: TimeChoice,
}

impl SelectionState {
    pub fn is_routable(&self, directory: &LocationDirectory) -> bool {
        directory.resolve(&self.pickup).is_some() && directory.resolve(&self.dropoff).is_some()
    }

    /// Resolves the date/time choice against `now`. Relative choices keep the current
    /// time of day on the chosen date and add their offset.
    pub fn departure(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = match &self.date {
            DateChoice::Today => now.date_naive(),
            DateChoice::Tomorrow => now.date_naive().succ_opt()?,
            DateChoice::On { date } => *date,
        };

        let naive = match (&self.time, self.time.offset()) {
            (TimeChoice::At { time }, _) => date.and_time(*time),
            (_, Some(offset)) => date.and_time(now.time()).checked_add_signed(offset)?,
            (_, None) => return None,
        };

        Some(Utc.from_utc_datetime(&naive))
    }
}

/// A user edit as it arrives from the hosting UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum SelectionEvent {
    Pickup(String),
    Dropoff(String),
    Date(DateChoice),
    Time(TimeChoice),
}

/// Change notification emitted by every setter of [`Selection`].
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionChange {
    Pickup(String),
    Dropoff(String),
    Date(DateChoice),
    Time(TimeChoice),
}

impl SelectionChange {
    pub fn affects_route(&self) -> bool {
        matches!(self, Self::Pickup(_) | Self::Dropoff(_))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Selection {
    state: SelectionState,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn set_pickup(&mut self, name: String) -> SelectionChange {
        self.state.pickup = name.clone();
        SelectionChange::Pickup(name)
    }

    pub fn set_dropoff(&mut self, name: String) -> SelectionChange {
        self.state.dropoff = name.clone();
        SelectionChange::Dropoff(name)
    }

    pub fn set_date(&mut self, choice: DateChoice) -> SelectionChange {
        self.state.date = choice.clone();
        SelectionChange::Date(choice)
    }

    pub fn set_time(&mut self, choice: TimeChoice) -> SelectionChange {
        self.state.time = choice.clone();
        SelectionChange::Time(choice)
    }

    pub fn apply(&mut self, event: SelectionEvent) -> SelectionChange {
        match event {
            SelectionEvent::Pickup(name) => self.set_pickup(name),
            SelectionEvent::Dropoff(name) => self.set_dropoff(name),
            SelectionEvent::Date(choice) => self.set_date(choice),
            SelectionEvent::Time(choice) => self.set_time(choice),
        }
    }
}

#[test]
fn setters_emit_change_test() {
    let mut selection = Selection::new();

    assert_eq!(selection.state().pickup, "");
    assert_eq!(selection.state().time, TimeChoice::Now);

    let change = selection.set_pickup("Mirpur".into());
    assert_eq!(change, SelectionChange::Pickup("Mirpur".into()));
    assert!(change.affects_route());
    assert_eq!(selection.state().pickup, "Mirpur");

    // unchanged values still notify
    let change = selection.set_pickup("Mirpur".into());
    assert_eq!(change, SelectionChange::Pickup("Mirpur".into()));

    let change = selection.apply(SelectionEvent::Time(TimeChoice::In30Minutes));
    assert!(!change.affects_route());
    assert_eq!(selection.state().time, TimeChoice::In30Minutes);
}

#[test]
fn is_routable_test() {
    let directory = LocationDirectory::reference();
    let mut selection = Selection::new();

    selection.set_pickup("Airport".into());
    assert!(!selection.state().is_routable(&directory));

    selection.set_dropoff("Mirpur".into());
    assert!(!selection.state().is_routable(&directory));

    selection.set_dropoff("Banani".into());
    assert!(selection.state().is_routable(&directory));
}

#[test]
fn departure_test() {
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 23, 50, 0).unwrap();
    let mut state = SelectionState::default();

    assert_eq!(state.departure(now), Some(now));

    state.time = TimeChoice::In15Minutes;
    assert_eq!(
        state.departure(now),
        Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 5, 0).unwrap())
    );

    state.date = DateChoice::Tomorrow;
    state.time = TimeChoice::At {
        time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
    };
    assert_eq!(
        state.departure(now),
        Some(Utc.with_ymd_and_hms(2024, 3, 11, 8, 30, 0).unwrap())
    );
}

#[test]
fn selection_event_wire_format_test() {
    let event: SelectionEvent =
        serde_json::from_str(r#"{"field": "pickup", "value": "Gulshan"}"#).unwrap();
    assert_eq!(event, SelectionEvent::Pickup("Gulshan".into()));

    let event: SelectionEvent =
        serde_json::from_str(r#"{"field": "time", "value": {"name": "in1_hour"}}"#).unwrap();
    assert_eq!(event, SelectionEvent::Time(TimeChoice::In1Hour));
}
