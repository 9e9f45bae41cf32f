//! Imperative drawing API of the hosting UI's map widget.

pub mod scene;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Camera, Coordinates, MarkerSpec, PathStyle, TileLayer, Viewport};
use crate::error::Error;

pub use scene::{MapScene, SceneSurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapId(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub Uuid);

/// The element a map gets rendered into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPoint {
    pub element_id: String,
    pub width: f64,
    pub height: f64,
}

impl AttachmentPoint {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }
}

/// Creation fails with `resource_unavailable_error` when the attachment point is not
/// present. Calls on ids that were already removed fail with `surface_error`.
pub trait MapSurface: Send {
    fn create_map(
        &mut self,
        attachment: &AttachmentPoint,
        camera: &Camera,
        tiles: &TileLayer,
    ) -> Result<MapId, Error>;

    fn set_view(&mut self, map: MapId, camera: &Camera) -> Result<(), Error>;

    fn add_marker(&mut self, map: MapId, marker: &MarkerSpec) -> Result<OverlayId, Error>;

    fn update_marker(
        &mut self,
        marker: OverlayId,
        position: Coordinates,
        label: &str,
    ) -> Result<(), Error>;

    fn add_path(
        &mut self,
        map: MapId,
        waypoints: &[Coordinates],
        style: &PathStyle,
    ) -> Result<OverlayId, Error>;

    fn set_path(&mut self, path: OverlayId, waypoints: &[Coordinates]) -> Result<(), Error>;

    fn remove_overlay(&mut self, overlay: OverlayId) -> Result<(), Error>;

    fn remove_map(&mut self, map: MapId) -> Result<(), Error>;
}
