use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use uuid::Uuid;

use super::{AttachmentPoint, MapId, MapSurface, OverlayId};
use crate::entities::{Camera, Coordinates, Icon, MarkerSpec, PathStyle, TileLayer};
use crate::error::{resource_unavailable_error, surface_error, unexpected_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PathView {
    pub waypoints: Vec<Coordinates>,
    pub style: PathStyle,
}

/// Everything currently drawn on one map.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapScene {
    pub map: MapId,
    pub element_id: String,
    pub camera: Camera,
    pub tiles: TileLayer,
    pub markers: Vec<MarkerSpec>,
    pub paths: Vec<PathView>,
}

#[derive(Debug)]
enum Overlay {
    Marker {
        position: Coordinates,
        icon: Icon,
        label: String,
    },
    Path {
        waypoints: Vec<Coordinates>,
        style: PathStyle,
    },
}

#[derive(Debug)]
struct OverlayRecord {
    map: MapId,
    order: u64,
    overlay: Overlay,
}

#[derive(Debug)]
struct MapRecord {
    element_id: String,
    camera: Camera,
    tiles: TileLayer,
}

#[derive(Debug, Default)]
struct Scene {
    elements: HashMap<String, Option<MapId>>,
    maps: HashMap<MapId, MapRecord>,
    overlays: HashMap<OverlayId, OverlayRecord>,
    created: u64,
    operations: u64,
}

/// Retained in-process scene. Clones share the same scene, so the hosting side can
/// read back what the sessions drew.
#[derive(Clone, Debug, Default)]
pub struct SceneSurface {
    inner: Arc<Mutex<Scene>>,
}

impl SceneSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `element_id` available as an attachment point.
    pub fn attach(&self, element_id: &str) -> Result<(), Error> {
        let mut scene = self.lock()?;
        scene.elements.entry(element_id.into()).or_insert(None);
        Ok(())
    }

    pub fn detach(&self, element_id: &str) -> Result<(), Error> {
        self.lock()?.elements.remove(element_id);
        Ok(())
    }

    pub fn is_attached(&self, element_id: &str) -> bool {
        self.lock()
            .map(|scene| scene.elements.contains_key(element_id))
            .unwrap_or_default()
    }

    /// Number of drawing API calls received so far, failed ones included.
    pub fn operations(&self) -> u64 {
        self.lock().map(|scene| scene.operations).unwrap_or_default()
    }

    pub fn live_maps(&self) -> usize {
        self.lock().map(|scene| scene.maps.len()).unwrap_or_default()
    }

    pub fn live_overlays(&self) -> usize {
        self.lock()
            .map(|scene| scene.overlays.len())
            .unwrap_or_default()
    }

    /// The map currently hosted by `element_id`, if any.
    pub fn map_on(&self, element_id: &str) -> Option<MapId> {
        self.lock().ok()?.elements.get(element_id).copied().flatten()
    }

    pub fn scene(&self, map: MapId) -> Option<MapScene> {
        let scene = self.lock().ok()?;
        let record = scene.maps.get(&map)?;

        let mut overlays: Vec<&OverlayRecord> = scene
            .overlays
            .values()
            .filter(|o| o.map == map)
            .collect();
        overlays.sort_by_key(|o| o.order);

        let mut markers = vec![];
        let mut paths = vec![];

        for record in overlays {
            match &record.overlay {
                Overlay::Marker {
                    position,
                    icon,
                    label,
                } => markers.push(MarkerSpec {
                    position: *position,
                    icon: icon.clone(),
                    label: label.clone(),
                }),
                Overlay::Path { waypoints, style } => paths.push(PathView {
                    waypoints: waypoints.clone(),
                    style: style.clone(),
                }),
            }
        }

        Some(MapScene {
            map,
            element_id: record.element_id.clone(),
            camera: record.camera,
            tiles: record.tiles.clone(),
            markers,
            paths,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Scene>, Error> {
        self.inner.lock().map_err(|_| unexpected_error())
    }

    fn operate(&self) -> Result<MutexGuard<'_, Scene>, Error> {
        let mut scene = self.lock()?;
        scene.operations += 1;
        Ok(scene)
    }
}

impl Scene {
    fn add_overlay(&mut self, map: MapId, overlay: Overlay) -> Result<OverlayId, Error> {
        if !self.maps.contains_key(&map) {
            return Err(surface_error());
        }

        self.created += 1;
        let id = OverlayId(Uuid::new_v4());
        self.overlays.insert(
            id,
            OverlayRecord {
                map,
                order: self.created,
                overlay,
            },
        );

        Ok(id)
    }
}

impl MapSurface for SceneSurface {
    fn create_map(
        &mut self,
        attachment: &AttachmentPoint,
        camera: &Camera,
        tiles: &TileLayer,
    ) -> Result<MapId, Error> {
        let mut scene = self.operate()?;

        let slot = scene
            .elements
            .get_mut(&attachment.element_id)
            .ok_or_else(resource_unavailable_error)?;

        // an element hosts at most one map
        if slot.is_some() {
            return Err(resource_unavailable_error());
        }

        let map = MapId(Uuid::new_v4());
        *slot = Some(map);

        scene.maps.insert(
            map,
            MapRecord {
                element_id: attachment.element_id.clone(),
                camera: *camera,
                tiles: tiles.clone(),
            },
        );

        Ok(map)
    }

    fn set_view(&mut self, map: MapId, camera: &Camera) -> Result<(), Error> {
        let mut scene = self.operate()?;
        let record = scene.maps.get_mut(&map).ok_or_else(surface_error)?;
        record.camera = *camera;
        Ok(())
    }

    fn add_marker(&mut self, map: MapId, marker: &MarkerSpec) -> Result<OverlayId, Error> {
        let mut scene = self.operate()?;
        scene.add_overlay(
            map,
            Overlay::Marker {
                position: marker.position,
                icon: marker.icon.clone(),
                label: marker.label.clone(),
            },
        )
    }

    fn update_marker(
        &mut self,
        marker: OverlayId,
        position: Coordinates,
        label: &str,
    ) -> Result<(), Error> {
        let mut scene = self.operate()?;

        match scene.overlays.get_mut(&marker).map(|r| &mut r.overlay) {
            Some(Overlay::Marker {
                position: p,
                label: l,
                ..
            }) => {
                *p = position;
                *l = label.into();
                Ok(())
            }
            _ => Err(surface_error()),
        }
    }

    fn add_path(
        &mut self,
        map: MapId,
        waypoints: &[Coordinates],
        style: &PathStyle,
    ) -> Result<OverlayId, Error> {
        let mut scene = self.operate()?;
        scene.add_overlay(
            map,
            Overlay::Path {
                waypoints: waypoints.to_vec(),
                style: style.clone(),
            },
        )
    }

    fn set_path(&mut self, path: OverlayId, waypoints: &[Coordinates]) -> Result<(), Error> {
        let mut scene = self.operate()?;

        match scene.overlays.get_mut(&path).map(|r| &mut r.overlay) {
            Some(Overlay::Path { waypoints: w, .. }) => {
                *w = waypoints.to_vec();
                Ok(())
            }
            _ => Err(surface_error()),
        }
    }

    fn remove_overlay(&mut self, overlay: OverlayId) -> Result<(), Error> {
        let mut scene = self.operate()?;
        scene
            .overlays
            .remove(&overlay)
            .map(|_| ())
            .ok_or_else(surface_error)
    }

    fn remove_map(&mut self, map: MapId) -> Result<(), Error> {
        let mut scene = self.operate()?;
        let record = scene.maps.remove(&map).ok_or_else(surface_error)?;

        scene.overlays.retain(|_, o| o.map != map);

        if let Some(slot) = scene.elements.get_mut(&record.element_id) {
            *slot = None;
        }

        Ok(())
    }
}

#[test]
fn create_map_requires_attachment_test() {
    let mut surface = SceneSurface::new();
    let attachment = AttachmentPoint {
        element_id: "map".into(),
        width: 800.0,
        height: 600.0,
    };
    let camera = Camera::new(Coordinates { lat: 0.0, lng: 0.0 }, 13.0);
    let tiles = crate::entities::MapStyle::default().tiles;

    let result = surface.create_map(&attachment, &camera, &tiles);
    assert!(result.unwrap_err().is_resource_unavailable_error());

    surface.attach("map").unwrap();
    let map = surface.create_map(&attachment, &camera, &tiles).unwrap();

    // second map on the same element
    let result = surface.create_map(&attachment, &camera, &tiles);
    assert!(result.unwrap_err().is_resource_unavailable_error());

    surface.remove_map(map).unwrap();
    assert!(surface.create_map(&attachment, &camera, &tiles).is_ok());
    assert_eq!(surface.operations(), 5);
}

#[test]
fn remove_twice_fails_test() {
    let mut surface = SceneSurface::new();
    surface.attach("map").unwrap();

    let attachment = AttachmentPoint {
        element_id: "map".into(),
        width: 800.0,
        height: 600.0,
    };
    let style = crate::entities::MapStyle::default();
    let map = surface
        .create_map(&attachment, &style.initial_camera, &style.tiles)
        .unwrap();

    let path = surface
        .add_path(map, &[style.initial_camera.center], &style.path)
        .unwrap();
    assert_eq!(surface.scene(map).unwrap().paths.len(), 1);

    surface.remove_overlay(path).unwrap();
    assert!(surface.remove_overlay(path).is_err());

    surface.remove_map(map).unwrap();
    assert!(surface.remove_map(map).is_err());
    assert!(surface.scene(map).is_none());
}
