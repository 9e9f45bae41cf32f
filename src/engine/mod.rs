mod auth_api;
mod event;
mod location_api;
mod session;
mod synchronizer;
#[cfg(test)]
mod testing;
mod view;
mod view_api;

use std::collections::HashMap;
use std::sync::Arc;

use async_channel::Sender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use event::{Event, RouteOutcome, RouteTicket};
pub use session::{MarkerInfo, SessionHandle, SessionInfo, SessionManager, SessionState};
pub use synchronizer::{Resolution, RouteSynchronizer};
pub use view::{Flow, Notice, RideView, ViewSnapshot, MAX_NOTICES, ROUTE_FAILED_MESSAGE};

use crate::{
    api::{DynRouting, API},
    auth::CredentialStore,
    config::Config,
    entities::LocationDirectory,
    error::{invalid_input_error, invalid_state_error, Error},
    external::{auth_service::AuthClient, osrm::OsrmClient},
    surface::SceneSurface,
};

struct ViewTask {
    events: Sender<Event>,
    task: JoinHandle<()>,
    /// Element the view last mounted on.
    element: Option<String>,
}

pub struct Engine {
    config: Config,
    directory: Arc<LocationDirectory>,
    surface: SceneSurface,
    routing: DynRouting,
    auth: AuthClient,
    credentials: Mutex<CredentialStore>,
    views: Mutex<HashMap<Uuid, ViewTask>>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(config: Config, routing: DynRouting) -> Self {
        Self {
            auth: AuthClient::new(config.auth_api_base.clone()),
            config,
            directory: Arc::new(LocationDirectory::reference()),
            surface: SceneSurface::new(),
            routing,
            credentials: Mutex::new(CredentialStore::new()),
            views: Mutex::new(HashMap::new()),
        }
    }

    /// Routes through OSRM at `config.osrm_api_base`.
    pub fn from_config(config: Config) -> Self {
        let routing = Arc::new(OsrmClient::new(
            config.osrm_api_base.clone(),
            config.route_timeout,
        ));

        Self::new(config, routing)
    }

    /// The scene every view draws into.
    pub fn surface(&self) -> &SceneSurface {
        &self.surface
    }

    async fn sender(&self, id: Uuid) -> Result<Sender<Event>, Error> {
        let views = self.views.lock().await;
        let view = views.get(&id).ok_or_else(invalid_input_error)?;

        Ok(view.events.clone())
    }

    async fn send(&self, id: Uuid, event: Event) -> Result<(), Error> {
        let events = self.sender(id).await?;

        events.send(event).await.map_err(|_| invalid_state_error())
    }

    /// Drops `element_id` from the scene once no view claims it and no map sits on it.
    fn release_element(&self, views: &HashMap<Uuid, ViewTask>, element_id: &str) {
        let claimed = views
            .values()
            .any(|view| view.element.as_deref() == Some(element_id));

        if claimed || self.surface.map_on(element_id).is_some() {
            return;
        }

        if let Err(e) = self.surface.detach(element_id) {
            tracing::warn!("could not detach {}: {}", element_id, e);
        }
    }
}

impl API for Engine {}

#[cfg(test)]
fn test_engine(routing: DynRouting) -> Engine {
    Engine::new(Config::default(), routing)
}

#[cfg(test)]
fn test_attachment(element_id: &str) -> crate::surface::AttachmentPoint {
    crate::surface::AttachmentPoint {
        element_id: element_id.into(),
        width: 800.0,
        height: 600.0,
    }
}

#[tokio::test(start_paused = true)]
async fn pickup_dropoff_scenario_test() {
    use crate::api::ViewAPI;
    use crate::entities::{Coordinates, SelectionEvent};
    use std::time::Duration;

    let airport = Coordinates::new(23.8513, 90.4061).unwrap();
    let gulshan = Coordinates::new(23.7925, 90.4078).unwrap();
    let path = vec![gulshan, Coordinates::new(23.81, 90.41).unwrap(), airport];

    let engine = test_engine(Arc::new(testing::PairRouting {
        from: gulshan,
        to: airport,
        path: path.clone(),
    }));

    let id = engine.create_view().await.unwrap();
    let handle = engine.mount_view(id, test_attachment("map")).await.unwrap();

    let snapshot = engine.find_view(id).await.unwrap();
    let session = snapshot.session.unwrap();
    assert_eq!(session.handle, handle);
    assert_eq!(session.pickup.label, "Pickup: Airport");
    assert_eq!(session.dropoff.label, "Dropoff: Gulshan");

    engine
        .update_selection(id, SelectionEvent::Pickup("Gulshan".into()))
        .await
        .unwrap();
    engine
        .update_selection(id, SelectionEvent::Dropoff("Airport".into()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = engine.find_view(id).await.unwrap();
    let session = snapshot.session.unwrap();
    assert_eq!(session.pickup.position, gulshan);
    assert_eq!(session.dropoff.position, airport);
    assert_eq!(session.route, path);
    assert!(session.route_attached);

    let map = engine.surface().map_on("map").unwrap();
    let scene = engine.surface().scene(map).unwrap();
    assert_eq!(scene.paths.len(), 1);
    assert_eq!(scene.paths[0].waypoints, path);

    engine.destroy_view(id).await.unwrap();
    assert_eq!(engine.surface().live_maps(), 0);
}

#[tokio::test(start_paused = true)]
async fn unmount_in_flight_leaves_no_resources_test() {
    use crate::api::ViewAPI;
    use crate::entities::SelectionEvent;
    use std::time::Duration;

    let routing = testing::Gated::new();
    let engine = test_engine(Arc::new(routing.clone()));

    let id = engine.create_view().await.unwrap();
    engine.mount_view(id, test_attachment("map")).await.unwrap();

    engine
        .update_selection(id, SelectionEvent::Pickup("Uttara".into()))
        .await
        .unwrap();
    engine
        .update_selection(id, SelectionEvent::Dropoff("Banani".into()))
        .await
        .unwrap();
    engine.unmount_view(id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let operations = engine.surface().operations();

    routing.release(2);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(engine.surface().operations(), operations);
    assert_eq!(engine.surface().live_maps(), 0);
    assert_eq!(engine.surface().live_overlays(), 0);
    assert!(engine.find_view(id).await.unwrap().session.is_none());
}

#[tokio::test]
async fn unknown_view_test() {
    use crate::api::ViewAPI;

    let engine = test_engine(Arc::new(testing::StraightLine));
    let id = Uuid::new_v4();

    assert!(engine.find_view(id).await.unwrap_err().is_invalid_input_error());
    assert!(engine.unmount_view(id).await.unwrap_err().is_invalid_input_error());
    assert!(engine.destroy_view(id).await.unwrap_err().is_invalid_input_error());
}

#[tokio::test]
async fn shutdown_releases_every_view_test() {
    use crate::api::ViewAPI;

    let engine = test_engine(Arc::new(testing::StraightLine));

    for element_id in ["left", "right"] {
        let id = engine.create_view().await.unwrap();
        engine.mount_view(id, test_attachment(element_id)).await.unwrap();
    }
    assert_eq!(engine.surface().live_maps(), 2);

    engine.shutdown().await.unwrap();

    assert_eq!(engine.surface().live_maps(), 0);
    assert_eq!(engine.surface().live_overlays(), 0);
    assert!(!engine.surface().is_attached("left"));
    assert!(!engine.surface().is_attached("right"));
}

#[tokio::test]
async fn unknown_view_does_not_attach_test() {
    use crate::api::ViewAPI;

    let engine = test_engine(Arc::new(testing::StraightLine));

    let err = engine
        .mount_view(Uuid::new_v4(), test_attachment("map"))
        .await
        .unwrap_err();

    assert!(err.is_invalid_input_error());
    assert!(!engine.surface().is_attached("map"));
}

#[tokio::test]
async fn elements_detached_with_their_view_test() {
    use crate::api::ViewAPI;

    let engine = test_engine(Arc::new(testing::StraightLine));

    let id = engine.create_view().await.unwrap();
    engine.mount_view(id, test_attachment("first")).await.unwrap();
    assert!(engine.surface().is_attached("first"));

    // moving to another element lets go of the first one
    engine.mount_view(id, test_attachment("second")).await.unwrap();
    assert!(!engine.surface().is_attached("first"));
    assert!(engine.surface().is_attached("second"));

    engine.unmount_view(id).await.unwrap();
    assert!(!engine.surface().is_attached("second"));

    engine.mount_view(id, test_attachment("third")).await.unwrap();
    engine.destroy_view(id).await.unwrap();
    assert!(!engine.surface().is_attached("third"));
    assert_eq!(engine.surface().live_maps(), 0);
}

#[tokio::test]
async fn occupied_element_stays_with_its_owner_test() {
    use crate::api::ViewAPI;

    let engine = test_engine(Arc::new(testing::StraightLine));

    let owner = engine.create_view().await.unwrap();
    let other = engine.create_view().await.unwrap();
    engine.mount_view(owner, test_attachment("map")).await.unwrap();

    assert!(engine.mount_view(other, test_attachment("map")).await.is_err());

    assert!(engine.surface().is_attached("map"));
    assert!(engine.surface().map_on("map").is_some());
}
