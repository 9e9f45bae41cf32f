use std::sync::Arc;

use async_channel::{Receiver, Sender};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{
    Event, Resolution, RouteOutcome, RouteSynchronizer, SessionHandle, SessionInfo,
    SessionManager,
};
use crate::entities::{LocationDirectory, MapStyle, Selection, SelectionEvent, SelectionState};
use crate::error::{invalid_input_error, Error};
use crate::surface::{AttachmentPoint, MapSurface};

pub const ROUTE_FAILED_MESSAGE: &str =
    "Unable to compute a route right now; showing the previous route.";

/// Only the most recent notices are kept.
pub const MAX_NOTICES: usize = 20;

/// A non-fatal message for the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notice {
    pub code: i32,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub id: Uuid,
    pub selection: SelectionState,
    pub departure: Option<DateTime<Utc>>,
    pub session: Option<SessionInfo>,
    pub notices: Vec<Notice>,
}

pub enum Flow {
    Continue,
    Stop,
}

/// One ride-request screen: selection, the map session behind it and the synchronizer
/// between them. All of it is driven from a single event queue.
pub struct RideView {
    id: Uuid,
    directory: Arc<LocationDirectory>,
    style: MapStyle,
    selection: Selection,
    sessions: SessionManager,
    synchronizer: RouteSynchronizer,
    session: Option<SessionHandle>,
    notices: Vec<Notice>,
    events: Sender<Event>,
}

impl RideView {
    pub fn new(
        id: Uuid,
        directory: Arc<LocationDirectory>,
        style: MapStyle,
        surface: Box<dyn MapSurface>,
        synchronizer: RouteSynchronizer,
        events: Sender<Event>,
    ) -> Self {
        Self {
            id,
            directory,
            style,
            selection: Selection::new(),
            sessions: SessionManager::new(surface),
            synchronizer,
            session: None,
            notices: vec![],
            events,
        }
    }

    #[tracing::instrument(name = "RideView::run", skip_all, fields(view = %self.id))]
    pub async fn run(mut self, events: Receiver<Event>) {
        while let Ok(event) = events.recv().await {
            if let Flow::Stop = self.handle(event) {
                break;
            }
        }

        self.unmount();
        tracing::info!("view stopped");
    }

    /// Runs one event to completion.
    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Mount { attachment, reply } => {
                let result = self.mount(&attachment);

                if let Some(reply) = reply {
                    if reply.send(result).is_err() {
                        tracing::debug!("mount caller went away");
                    }
                }
            }
            Event::Unmount => self.unmount(),
            Event::Select(event) => self.select(event),
            Event::OverlayDue(handle) => self.sessions.attach_route_overlay(handle),
            Event::RouteResolved(outcome) => self.route_resolved(outcome),
            Event::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    tracing::debug!("snapshot caller went away");
                }
            }
            Event::Shutdown => return Flow::Stop,
        }

        Flow::Continue
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            id: self.id,
            selection: self.selection.state().clone(),
            departure: self.selection.state().departure(Utc::now()),
            session: self.session.and_then(|handle| self.sessions.inspect(handle)),
            notices: self.notices.clone(),
        }
    }

    /// Opens a session on `attachment`, closing the previous one first.
    #[tracing::instrument(skip(self))]
    fn mount(&mut self, attachment: &AttachmentPoint) -> Result<SessionHandle, Error> {
        self.unmount();

        let pickup = self
            .directory
            .resolve(&self.style.default_pickup)
            .cloned()
            .ok_or_else(invalid_input_error)?;
        let dropoff = self
            .directory
            .resolve(&self.style.default_dropoff)
            .cloned()
            .ok_or_else(invalid_input_error)?;

        let handle = self
            .sessions
            .open(attachment, &pickup, &dropoff, &self.style)?;
        self.session = Some(handle);

        let events = self.events.clone();
        let delay = self.style.overlay_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if events.send(Event::OverlayDue(handle)).await.is_err() {
                tracing::debug!("view is gone, overlay abandoned");
            }
        });

        self.synchronizer
            .request_route(handle, pickup.coordinates, dropoff.coordinates);

        Ok(handle)
    }

    fn unmount(&mut self) {
        if let Some(handle) = self.session.take() {
            self.sessions.close(handle);
            self.synchronizer.forget(handle);
        }
    }

    fn select(&mut self, event: SelectionEvent) {
        let change = self.selection.apply(event);

        if !change.affects_route() {
            return;
        }

        let handle = match self.session {
            Some(handle) => handle,
            None => {
                tracing::debug!("no session mounted, selection kept for later");
                return;
            }
        };

        self.synchronizer.on_selection_change(
            &mut self.sessions,
            handle,
            &self.directory,
            self.selection.state(),
        );
    }

    fn route_resolved(&mut self, outcome: RouteOutcome) {
        if let Resolution::Failed(err) = self.synchronizer.resolve(&mut self.sessions, outcome) {
            tracing::warn!("reporting route failure to the user");

            if self.notices.len() >= MAX_NOTICES {
                self.notices.remove(0);
            }

            self.notices.push(Notice {
                code: err.code,
                message: ROUTE_FAILED_MESSAGE.into(),
                at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
fn test_view(
    routing: crate::api::DynRouting,
) -> (RideView, crate::surface::SceneSurface, Receiver<Event>) {
    use crate::entities::TravelProfile;
    use std::time::Duration;

    let surface = crate::surface::SceneSurface::new();
    let (tx, rx) = async_channel::unbounded();
    let style = MapStyle::default();

    let synchronizer = RouteSynchronizer::new(
        routing,
        TravelProfile::Driving,
        style.fit_padding,
        Duration::from_secs(10),
        tx.clone(),
    );

    let view = RideView::new(
        Uuid::new_v4(),
        Arc::new(LocationDirectory::reference()),
        style,
        Box::new(surface.clone()),
        synchronizer,
        tx,
    );

    (view, surface, rx)
}

#[cfg(test)]
fn attachment() -> AttachmentPoint {
    AttachmentPoint {
        element_id: "map".into(),
        width: 800.0,
        height: 600.0,
    }
}

#[tokio::test]
async fn mount_retries_after_attachment_appears_test() {
    use super::testing::StraightLine;
    use tokio::sync::oneshot;

    let (mut view, surface, _rx) = test_view(Arc::new(StraightLine));

    let (reply, result) = oneshot::channel();
    view.handle(Event::Mount {
        attachment: attachment(),
        reply: Some(reply),
    });
    assert!(result.await.unwrap().unwrap_err().is_resource_unavailable_error());
    assert!(view.snapshot().session.is_none());

    surface.attach("map").unwrap();

    let (reply, result) = oneshot::channel();
    view.handle(Event::Mount {
        attachment: attachment(),
        reply: Some(reply),
    });
    let handle = result.await.unwrap().unwrap();
    assert_eq!(view.snapshot().session.unwrap().handle, handle);
}

#[tokio::test(start_paused = true)]
async fn run_loop_scenario_test() {
    use super::testing::PairRouting;
    use super::SessionState;
    use crate::entities::Coordinates;
    use std::time::Duration;
    use tokio::sync::oneshot;

    let airport = Coordinates::new(23.8513, 90.4061).unwrap();
    let gulshan = Coordinates::new(23.7925, 90.4078).unwrap();
    let path = vec![gulshan, Coordinates::new(23.81, 90.41).unwrap(), airport];

    let (view, surface, rx) = test_view(Arc::new(PairRouting {
        from: gulshan,
        to: airport,
        path: path.clone(),
    }));
    surface.attach("map").unwrap();

    let events = view.events.clone();
    let task = tokio::spawn(view.run(rx));

    events
        .send(Event::Mount {
            attachment: attachment(),
            reply: None,
        })
        .await
        .unwrap();
    events
        .send(Event::Select(SelectionEvent::Pickup("Gulshan".into())))
        .await
        .unwrap();
    events
        .send(Event::Select(SelectionEvent::Dropoff("Airport".into())))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let (reply, snapshot) = oneshot::channel();
    events.send(Event::Snapshot(reply)).await.unwrap();
    let snapshot = snapshot.await.unwrap();

    let session = snapshot.session.unwrap();
    assert_eq!(session.state, SessionState::Ready);
    assert_eq!(session.pickup.position, gulshan);
    assert_eq!(session.dropoff.position, airport);
    assert_eq!(session.route, path);
    assert!(session.route_attached);
    assert!(snapshot.notices.is_empty());

    let scene = surface.scene(surface.map_on("map").unwrap()).unwrap();
    assert_eq!(scene.paths[0].waypoints, path);

    events.send(Event::Shutdown).await.unwrap();
    task.await.unwrap();

    assert_eq!(surface.live_maps(), 0);
    assert_eq!(surface.live_overlays(), 0);
}

#[tokio::test(start_paused = true)]
async fn unmount_with_request_in_flight_test() {
    use super::testing::Gated;
    use std::time::Duration;

    let routing = Gated::new();
    let (view, surface, rx) = test_view(Arc::new(routing.clone()));
    surface.attach("map").unwrap();

    let events = view.events.clone();
    let task = tokio::spawn(view.run(rx));

    events
        .send(Event::Mount {
            attachment: attachment(),
            reply: None,
        })
        .await
        .unwrap();
    events
        .send(Event::Select(SelectionEvent::Pickup("Uttara".into())))
        .await
        .unwrap();
    events
        .send(Event::Select(SelectionEvent::Dropoff("Banani".into())))
        .await
        .unwrap();
    events.send(Event::Unmount).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(surface.live_maps(), 0);
    let operations = surface.operations();

    // both the initial and the selection request resolve after teardown
    routing.release(2);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(surface.operations(), operations);

    events.send(Event::Shutdown).await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn route_failure_reported_once_test() {
    use super::testing::Unreachable;
    use std::time::Duration;

    let (mut view, surface, rx) = test_view(Arc::new(Unreachable));
    surface.attach("map").unwrap();

    view.handle(Event::Mount {
        attachment: attachment(),
        reply: None,
    });
    let initial_route = view.snapshot().session.unwrap().route;

    view.handle(Event::Select(SelectionEvent::Pickup("Uttara".into())));
    view.handle(Event::Select(SelectionEvent::Dropoff("Banani".into())));

    tokio::time::sleep(Duration::from_millis(500)).await;

    // drain: the overlay timer plus one failure per request
    while let Ok(event) = rx.try_recv() {
        view.handle(event);
    }

    let snapshot = view.snapshot();
    // the initial request was superseded, so only the selection's failure is reported
    assert_eq!(snapshot.notices.len(), 1);
    assert_eq!(snapshot.notices[0].message, ROUTE_FAILED_MESSAGE);
    assert_eq!(snapshot.notices[0].code, 103);
    assert_eq!(snapshot.session.unwrap().route, initial_route);
}

#[tokio::test]
async fn remount_releases_previous_session_test() {
    use super::testing::StraightLine;

    let (mut view, surface, _rx) = test_view(Arc::new(StraightLine));
    surface.attach("map").unwrap();

    view.handle(Event::Mount {
        attachment: attachment(),
        reply: None,
    });
    let first = view.snapshot().session.unwrap().handle;

    view.handle(Event::Mount {
        attachment: attachment(),
        reply: None,
    });
    let second = view.snapshot().session.unwrap().handle;

    assert_ne!(first, second);
    assert_eq!(surface.live_maps(), 1);
    assert_eq!(surface.live_overlays(), 2);
    assert!(!view.sessions.is_live(first));
}

#[test]
fn selection_before_mount_is_kept_test() {
    use super::testing::StraightLine;

    let (mut view, _surface, _rx) = test_view(Arc::new(StraightLine));

    view.handle(Event::Select(SelectionEvent::Pickup("Uttara".into())));
    view.handle(Event::Select(SelectionEvent::Dropoff("Banani".into())));

    let snapshot = view.snapshot();
    assert_eq!(snapshot.selection.pickup, "Uttara");
    assert!(snapshot.session.is_none());
}

#[tokio::test(start_paused = true)]
async fn unanswered_route_reported_after_deadline_test() {
    use super::testing::Gated;
    use std::time::Duration;

    let (mut view, surface, rx) = test_view(Arc::new(Gated::new()));
    surface.attach("map").unwrap();

    view.handle(Event::Mount {
        attachment: attachment(),
        reply: None,
    });
    view.handle(Event::Select(SelectionEvent::Pickup("Uttara".into())));
    view.handle(Event::Select(SelectionEvent::Dropoff("Banani".into())));

    tokio::time::sleep(Duration::from_secs(5)).await;
    while let Ok(event) = rx.try_recv() {
        view.handle(event);
    }
    assert!(view.snapshot().notices.is_empty());

    tokio::time::sleep(Duration::from_secs(3600)).await;
    while let Ok(event) = rx.try_recv() {
        view.handle(event);
    }

    // the superseded initial request times out too but stays silent
    let notices = view.snapshot().notices;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].code, 103);
    assert_eq!(notices[0].message, ROUTE_FAILED_MESSAGE);
}

#[tokio::test]
async fn notices_are_capped_test() {
    use super::testing::{next_outcome, Unreachable};

    let (mut view, surface, rx) = test_view(Arc::new(Unreachable));
    surface.attach("map").unwrap();

    view.handle(Event::Mount {
        attachment: attachment(),
        reply: None,
    });
    view.handle(Event::RouteResolved(next_outcome(&rx).await));
    view.handle(Event::Select(SelectionEvent::Pickup("Uttara".into())));

    for i in 0..MAX_NOTICES + 5 {
        let dropoff = if i % 2 == 0 { "Banani" } else { "Dhanmondi" };
        view.handle(Event::Select(SelectionEvent::Dropoff(dropoff.into())));
        view.handle(Event::RouteResolved(next_outcome(&rx).await));
    }

    let notices = view.snapshot().notices;
    assert_eq!(notices.len(), MAX_NOTICES);
    assert!(notices.windows(2).all(|pair| pair[0].at <= pair[1].at));
}
