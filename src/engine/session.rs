use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{
    bounding_rect, dropoff_label, pickup_label, Camera, Coordinates, Icon, Location, MapStyle,
    MarkerSpec, PathStyle, Viewport,
};
use crate::error::Error;
use crate::surface::{AttachmentPoint, MapId, MapSurface, OverlayId};

/// Opaque reference to one open map session. Invalid once the session is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub Uuid);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerInfo {
    pub position: Coordinates,
    pub label: String,
}

/// What the manager last pushed to the surface for a session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionInfo {
    pub handle: SessionHandle,
    pub state: SessionState,
    pub camera: Camera,
    pub pickup: MarkerInfo,
    pub dropoff: MarkerInfo,
    pub route: Vec<Coordinates>,
    pub route_attached: bool,
}

struct MarkerSlot {
    id: Option<OverlayId>,
    position: Coordinates,
    label: String,
}

struct RouteSlot {
    id: Option<OverlayId>,
    waypoints: Vec<Coordinates>,
    style: PathStyle,
}

struct MapSession {
    state: SessionState,
    map: Option<MapId>,
    viewport: Viewport,
    max_zoom: f64,
    camera: Camera,
    pickup: MarkerSlot,
    dropoff: MarkerSlot,
    route: RouteSlot,
}

impl MapSession {
    fn info(&self, handle: SessionHandle) -> SessionInfo {
        SessionInfo {
            handle,
            state: self.state,
            camera: self.camera,
            pickup: MarkerInfo {
                position: self.pickup.position,
                label: self.pickup.label.clone(),
            },
            dropoff: MarkerInfo {
                position: self.dropoff.position,
                label: self.dropoff.label.clone(),
            },
            route: self.route.waypoints.clone(),
            route_attached: self.route.id.is_some(),
        }
    }
}

/// Sole owner of every map, marker and route overlay created on the surface. Callers
/// only ever hold a [`SessionHandle`]; each operation re-checks that the session is
/// still live before touching the surface. Only live sessions are held; a closed one
/// leaves nothing but its handle behind.
pub struct SessionManager {
    surface: Box<dyn MapSurface>,
    sessions: HashMap<SessionHandle, MapSession>,
    closed: HashSet<SessionHandle>,
}

impl SessionManager {
    pub fn new(surface: Box<dyn MapSurface>) -> Self {
        Self {
            surface,
            sessions: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    /// Creates the map and both markers. The route overlay starts out deferred as the
    /// straight pickup/dropoff segment; see [`SessionManager::attach_route_overlay`].
    #[tracing::instrument(skip(self, style))]
    pub fn open(
        &mut self,
        attachment: &AttachmentPoint,
        initial_pickup: &Location,
        initial_dropoff: &Location,
        style: &MapStyle,
    ) -> Result<SessionHandle, Error> {
        let map = self
            .surface
            .create_map(attachment, &style.initial_camera, &style.tiles)?;

        let pickup = MarkerSlot {
            id: None,
            position: initial_pickup.coordinates,
            label: pickup_label(&initial_pickup.name),
        };
        let dropoff = MarkerSlot {
            id: None,
            position: initial_dropoff.coordinates,
            label: dropoff_label(&initial_dropoff.name),
        };

        let pickup_id = match self.add_marker(map, &pickup, &style.pickup_icon) {
            Ok(id) => id,
            Err(err) => {
                self.release_partial(map, &[]);
                return Err(err);
            }
        };

        let dropoff_id = match self.add_marker(map, &dropoff, &style.dropoff_icon) {
            Ok(id) => id,
            Err(err) => {
                self.release_partial(map, &[pickup_id]);
                return Err(err);
            }
        };

        let handle = SessionHandle(Uuid::new_v4());

        self.sessions.insert(
            handle,
            MapSession {
                state: SessionState::Initializing,
                map: Some(map),
                viewport: attachment.viewport(),
                max_zoom: style.max_zoom,
                camera: style.initial_camera,
                pickup: MarkerSlot {
                    id: Some(pickup_id),
                    ..pickup
                },
                dropoff: MarkerSlot {
                    id: Some(dropoff_id),
                    ..dropoff
                },
                route: RouteSlot {
                    id: None,
                    waypoints: vec![initial_pickup.coordinates, initial_dropoff.coordinates],
                    style: style.path.clone(),
                },
            },
        );

        tracing::info!("opened session {:?}", handle);

        Ok(handle)
    }

    /// Finishes the deferred part of `open`. Abandoned when the session was closed in
    /// the meantime; a surface failure leaves the session without a route overlay.
    #[tracing::instrument(skip(self))]
    pub fn attach_route_overlay(&mut self, handle: SessionHandle) {
        let Self {
            surface, sessions, ..
        } = self;

        let session = match sessions.get_mut(&handle) {
            Some(session) if session.state == SessionState::Initializing => session,
            _ => {
                tracing::debug!("session is not initializing, overlay abandoned");
                return;
            }
        };

        if let Some(map) = session.map {
            match surface.add_path(map, &session.route.waypoints, &session.route.style) {
                Ok(id) => session.route.id = Some(id),
                Err(err) => tracing::warn!("route overlay abandoned: {}", err),
            }
        }

        session.state = SessionState::Ready;
    }

    /// Releases markers, route overlay and map, in that order, and drops the session.
    /// A failed release is logged and the remaining ones still run. Closing twice is a
    /// no-op.
    #[tracing::instrument(skip(self))]
    pub fn close(&mut self, handle: SessionHandle) {
        let mut session = match self.sessions.remove(&handle) {
            Some(session) => session,
            None => {
                tracing::debug!("session already closed");
                return;
            }
        };

        self.closed.insert(handle);

        let overlays = [
            ("pickup marker", session.pickup.id.take()),
            ("dropoff marker", session.dropoff.id.take()),
            ("route overlay", session.route.id.take()),
        ];

        for (name, id) in overlays {
            if let Some(id) = id {
                if let Err(err) = self.surface.remove_overlay(id) {
                    tracing::warn!("failed to release {}: {}", name, err);
                }
            }
        }

        if let Some(map) = session.map.take() {
            if let Err(err) = self.surface.remove_map(map) {
                tracing::warn!("failed to release map: {}", err);
            }
        }

        tracing::info!("closed session {:?}", handle);
    }

    #[tracing::instrument(skip(self))]
    pub fn update_markers(
        &mut self,
        handle: SessionHandle,
        pickup: Option<&Location>,
        dropoff: Option<&Location>,
    ) {
        let Self {
            surface, sessions, ..
        } = self;

        let session = match sessions.get_mut(&handle) {
            Some(session) => session,
            None => {
                tracing::debug!("session closed, marker update skipped");
                return;
            }
        };

        if let Some(location) = pickup {
            move_marker(
                surface.as_mut(),
                &mut session.pickup,
                location.coordinates,
                pickup_label(&location.name),
            );
        }

        if let Some(location) = dropoff {
            move_marker(
                surface.as_mut(),
                &mut session.dropoff,
                location.coordinates,
                dropoff_label(&location.name),
            );
        }
    }

    /// Replaces the route path. While the overlay is still deferred the path is kept
    /// and drawn once the overlay attaches.
    #[tracing::instrument(skip(self, waypoints), fields(waypoints = waypoints.len()))]
    pub fn update_route(&mut self, handle: SessionHandle, waypoints: Vec<Coordinates>) {
        let Self {
            surface, sessions, ..
        } = self;

        let session = match sessions.get_mut(&handle) {
            Some(session) => session,
            None => {
                tracing::debug!("session closed, route update skipped");
                return;
            }
        };

        session.route.waypoints = waypoints;

        if let Some(id) = session.route.id {
            if let Err(err) = surface.set_path(id, &session.route.waypoints) {
                tracing::warn!("failed to update route overlay: {}", err);
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn fit_camera(&mut self, handle: SessionHandle, coords: &[Coordinates], padding: f64) {
        let Self {
            surface, sessions, ..
        } = self;

        let session = match sessions.get_mut(&handle) {
            Some(session) => session,
            None => {
                tracing::debug!("session closed, camera fit skipped");
                return;
            }
        };

        let bounds = match bounding_rect(coords) {
            Some(bounds) => bounds,
            None => return,
        };

        session.camera = Camera::fit(bounds, padding, session.viewport, session.max_zoom);

        if let Some(map) = session.map {
            if let Err(err) = surface.set_view(map, &session.camera) {
                tracing::warn!("failed to set camera: {}", err);
            }
        }
    }

    pub fn state(&self, handle: SessionHandle) -> SessionState {
        match self.sessions.get(&handle) {
            Some(session) => session.state,
            None if self.closed.contains(&handle) => SessionState::Closed,
            None => SessionState::Uninitialized,
        }
    }

    pub fn is_live(&self, handle: SessionHandle) -> bool {
        self.sessions.contains_key(&handle)
    }

    /// Sessions currently open.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn inspect(&self, handle: SessionHandle) -> Option<SessionInfo> {
        self.sessions.get(&handle).map(|s| s.info(handle))
    }

    fn add_marker(&mut self, map: MapId, slot: &MarkerSlot, icon: &Icon) -> Result<OverlayId, Error> {
        self.surface.add_marker(
            map,
            &MarkerSpec {
                position: slot.position,
                icon: icon.clone(),
                label: slot.label.clone(),
            },
        )
    }

    fn release_partial(&mut self, map: MapId, overlays: &[OverlayId]) {
        for id in overlays {
            if let Err(err) = self.surface.remove_overlay(*id) {
                tracing::warn!("failed to release marker: {}", err);
            }
        }

        if let Err(err) = self.surface.remove_map(map) {
            tracing::warn!("failed to release map: {}", err);
        }
    }
}

fn move_marker(
    surface: &mut dyn MapSurface,
    slot: &mut MarkerSlot,
    position: Coordinates,
    label: String,
) {
    slot.position = position;
    slot.label = label;

    if let Some(id) = slot.id {
        if let Err(err) = surface.update_marker(id, position, &slot.label) {
            tracing::warn!("failed to update marker: {}", err);
        }
    }
}

#[cfg(test)]
fn test_attachment() -> AttachmentPoint {
    AttachmentPoint {
        element_id: "map".into(),
        width: 800.0,
        height: 600.0,
    }
}

#[cfg(test)]
fn test_manager() -> (SessionManager, crate::surface::SceneSurface) {
    let surface = crate::surface::SceneSurface::new();
    surface.attach("map").unwrap();

    (SessionManager::new(Box::new(surface.clone())), surface)
}

#[cfg(test)]
fn location(name: &str) -> Location {
    crate::entities::LocationDirectory::reference()
        .resolve(name)
        .unwrap()
        .clone()
}

#[test]
fn open_creates_markers_and_deferred_route_test() {
    let (mut manager, surface) = test_manager();
    let style = MapStyle::default();
    let airport = location("Airport");
    let gulshan = location("Gulshan");

    let handle = manager
        .open(&test_attachment(), &airport, &gulshan, &style)
        .unwrap();
    assert_eq!(manager.state(handle), SessionState::Initializing);
    assert_eq!(surface.live_maps(), 1);

    let info = manager.inspect(handle).unwrap();
    let scene = surface.scene(surface.map_on("map").unwrap()).unwrap();

    assert_eq!(scene.markers.len(), 2);
    assert_eq!(scene.markers[0].position, airport.coordinates);
    assert_eq!(scene.markers[0].label, "Pickup: Airport");
    assert_eq!(scene.markers[1].position, gulshan.coordinates);
    assert_eq!(scene.markers[1].label, "Dropoff: Gulshan");
    assert!(scene.paths.is_empty());
    assert!(!info.route_attached);

    manager.attach_route_overlay(handle);
    assert_eq!(manager.state(handle), SessionState::Ready);

    let scene = surface.scene(surface.map_on("map").unwrap()).unwrap();
    assert_eq!(scene.paths.len(), 1);
    assert_eq!(
        scene.paths[0].waypoints,
        vec![airport.coordinates, gulshan.coordinates]
    );
}

#[test]
fn open_without_attachment_test() {
    let surface = crate::surface::SceneSurface::new();
    let mut manager = SessionManager::new(Box::new(surface.clone()));

    let result = manager.open(
        &test_attachment(),
        &location("Airport"),
        &location("Gulshan"),
        &MapStyle::default(),
    );

    assert!(result.unwrap_err().is_resource_unavailable_error());
    assert_eq!(surface.live_maps(), 0);
}

#[test]
fn close_is_idempotent_test() {
    let (mut manager, surface) = test_manager();
    let handle = manager
        .open(
            &test_attachment(),
            &location("Airport"),
            &location("Gulshan"),
            &MapStyle::default(),
        )
        .unwrap();
    manager.attach_route_overlay(handle);

    manager.close(handle);
    assert_eq!(manager.state(handle), SessionState::Closed);
    assert_eq!(surface.live_maps(), 0);
    assert_eq!(surface.live_overlays(), 0);

    let operations = surface.operations();
    manager.close(handle);
    assert_eq!(surface.operations(), operations);
}

#[test]
fn operations_after_close_are_noops_test() {
    let (mut manager, surface) = test_manager();
    let airport = location("Airport");
    let gulshan = location("Gulshan");

    let handle = manager
        .open(&test_attachment(), &airport, &gulshan, &MapStyle::default())
        .unwrap();
    manager.close(handle);

    let operations = surface.operations();

    manager.attach_route_overlay(handle);
    manager.update_markers(handle, Some(&gulshan), Some(&airport));
    manager.update_route(handle, vec![gulshan.coordinates, airport.coordinates]);
    manager.fit_camera(handle, &[gulshan.coordinates, airport.coordinates], 50.0);

    assert_eq!(surface.operations(), operations);
    assert_eq!(manager.state(handle), SessionState::Closed);
}

#[test]
fn deferred_overlay_uses_latest_route_test() {
    let (mut manager, surface) = test_manager();
    let airport = location("Airport");
    let gulshan = location("Gulshan");

    let handle = manager
        .open(&test_attachment(), &airport, &gulshan, &MapStyle::default())
        .unwrap();

    let path = vec![
        gulshan.coordinates,
        Coordinates {
            lat: 23.81,
            lng: 90.41,
        },
        airport.coordinates,
    ];
    manager.update_route(handle, path.clone());
    manager.attach_route_overlay(handle);

    let scene = surface.scene(surface.map_on("map").unwrap()).unwrap();
    assert_eq!(scene.paths[0].waypoints, path);
    assert!(manager.inspect(handle).unwrap().route_attached);
}

#[test]
fn overlay_abandoned_after_close_test() {
    let (mut manager, surface) = test_manager();
    let handle = manager
        .open(
            &test_attachment(),
            &location("Airport"),
            &location("Gulshan"),
            &MapStyle::default(),
        )
        .unwrap();

    manager.close(handle);
    manager.attach_route_overlay(handle);

    assert_eq!(surface.live_overlays(), 0);
    assert_eq!(manager.state(handle), SessionState::Closed);
}

#[test]
fn fit_camera_test() {
    let (mut manager, surface) = test_manager();
    let airport = location("Airport");
    let gulshan = location("Gulshan");
    let style = MapStyle::default();

    let handle = manager
        .open(&test_attachment(), &airport, &gulshan, &style)
        .unwrap();
    manager.fit_camera(handle, &[airport.coordinates, gulshan.coordinates], 50.0);

    let camera = manager.inspect(handle).unwrap().camera;
    assert_ne!(camera, style.initial_camera);
    assert!(camera.center.lat < airport.coordinates.lat);
    assert!(camera.center.lat > gulshan.coordinates.lat);

    let scene = surface.scene(surface.map_on("map").unwrap()).unwrap();
    assert_eq!(scene.camera, camera);
}

#[cfg(test)]
struct FlakySurface {
    inner: crate::surface::SceneSurface,
    failed_removals: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MapSurface for FlakySurface {
    fn create_map(
        &mut self,
        attachment: &AttachmentPoint,
        camera: &Camera,
        tiles: &crate::entities::TileLayer,
    ) -> Result<MapId, Error> {
        self.inner.create_map(attachment, camera, tiles)
    }

    fn set_view(&mut self, map: MapId, camera: &Camera) -> Result<(), Error> {
        self.inner.set_view(map, camera)
    }

    fn add_marker(&mut self, map: MapId, marker: &MarkerSpec) -> Result<OverlayId, Error> {
        self.inner.add_marker(map, marker)
    }

    fn update_marker(
        &mut self,
        marker: OverlayId,
        position: Coordinates,
        label: &str,
    ) -> Result<(), Error> {
        self.inner.update_marker(marker, position, label)
    }

    fn add_path(
        &mut self,
        map: MapId,
        waypoints: &[Coordinates],
        style: &PathStyle,
    ) -> Result<OverlayId, Error> {
        self.inner.add_path(map, waypoints, style)
    }

    fn set_path(&mut self, path: OverlayId, waypoints: &[Coordinates]) -> Result<(), Error> {
        self.inner.set_path(path, waypoints)
    }

    fn remove_overlay(&mut self, _: OverlayId) -> Result<(), Error> {
        self.failed_removals
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(crate::error::surface_error())
    }

    fn remove_map(&mut self, map: MapId) -> Result<(), Error> {
        self.inner.remove_map(map)
    }
}

#[test]
fn release_failure_does_not_block_test() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let surface = crate::surface::SceneSurface::new();
    surface.attach("map").unwrap();
    let failed_removals = Arc::new(AtomicUsize::new(0));

    let mut manager = SessionManager::new(Box::new(FlakySurface {
        inner: surface.clone(),
        failed_removals: failed_removals.clone(),
    }));

    let handle = manager
        .open(
            &test_attachment(),
            &location("Airport"),
            &location("Gulshan"),
            &MapStyle::default(),
        )
        .unwrap();
    manager.attach_route_overlay(handle);

    manager.close(handle);

    // all three overlay releases were attempted and the map was still removed
    assert_eq!(failed_removals.load(Ordering::SeqCst), 3);
    assert_eq!(surface.live_maps(), 0);
    assert_eq!(manager.state(handle), SessionState::Closed);

    manager.close(handle);
    assert_eq!(failed_removals.load(Ordering::SeqCst), 3);
}

#[test]
fn reopen_after_close_test() {
    let (mut manager, surface) = test_manager();
    let style = MapStyle::default();

    let first = manager
        .open(&test_attachment(), &location("Airport"), &location("Gulshan"), &style)
        .unwrap();
    manager.close(first);

    let second = manager
        .open(&test_attachment(), &location("Uttara"), &location("Banani"), &style)
        .unwrap();

    assert_ne!(first, second);
    assert!(manager.is_live(second));
    assert!(!manager.is_live(first));
    assert_eq!(surface.live_maps(), 1);
}

#[test]
fn closed_sessions_are_dropped_test() {
    let (mut manager, surface) = test_manager();
    let style = MapStyle::default();
    let airport = location("Airport");
    let gulshan = location("Gulshan");

    let mut handles = vec![];
    for _ in 0..1000 {
        let handle = manager
            .open(&test_attachment(), &airport, &gulshan, &style)
            .unwrap();
        manager.attach_route_overlay(handle);
        manager.close(handle);
        handles.push(handle);
    }

    assert!(manager.is_empty());
    assert!(manager.sessions.is_empty());
    assert_eq!(surface.live_maps(), 0);
    assert_eq!(surface.live_overlays(), 0);

    for handle in handles {
        assert_eq!(manager.state(handle), SessionState::Closed);
        assert!(manager.inspect(handle).is_none());
    }
}
