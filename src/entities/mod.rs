mod camera;
mod coordinates;
mod location;
mod route;
mod selection;
mod style;
mod user;

pub use camera::{Camera, Viewport};
pub use coordinates::{bounding_rect, Coordinates};
pub use location::{Location, LocationDirectory};
pub use route::TravelProfile;
pub use selection::{
    DateChoice, Selection, SelectionChange, SelectionEvent, SelectionState, TimeChoice,
};
pub use style::{dropoff_label, pickup_label, Icon, MapStyle, MarkerSpec, PathStyle, TileLayer};
pub use user::{AuthSession, Credentials, Registration, User};
