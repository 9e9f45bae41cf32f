use std::collections::HashMap;
use std::time::Duration;

use async_channel::Sender;

use super::{Event, RouteOutcome, RouteTicket, SessionHandle, SessionManager};
use crate::api::DynRouting;
use crate::entities::{Coordinates, LocationDirectory, SelectionState, TravelProfile};
use crate::error::{route_computation_failed_error, Error};

#[derive(Debug)]
pub enum Resolution {
    Applied,
    /// Superseded by a newer request or arrived after the session closed.
    Stale,
    /// The current request failed; the previous route stays on the map.
    Failed(Error),
}

/// Keeps markers, route and camera of a session in line with the selection. Only
/// mutates the session through the manager; route answers are applied only if they
/// belong to the newest request issued for a still-live session.
pub struct RouteSynchronizer {
    routing: DynRouting,
    profile: TravelProfile,
    padding: f64,
    timeout: Duration,
    events: Sender<Event>,
    last_seq: u64,
    latest: HashMap<SessionHandle, u64>,
}

impl RouteSynchronizer {
    pub fn new(
        routing: DynRouting,
        profile: TravelProfile,
        padding: f64,
        timeout: Duration,
        events: Sender<Event>,
    ) -> Self {
        Self {
            routing,
            profile,
            padding,
            timeout,
            events,
            last_seq: 0,
            latest: HashMap::new(),
        }
    }

    /// Markers and camera follow the selection right away; the route follows once the
    /// request issued here resolves. Unresolvable selections leave everything untouched.
    #[tracing::instrument(skip(self, sessions, directory))]
    pub fn on_selection_change(
        &mut self,
        sessions: &mut SessionManager,
        handle: SessionHandle,
        directory: &LocationDirectory,
        selection: &SelectionState,
    ) -> Option<RouteTicket> {
        let (pickup, dropoff) = match (
            directory.resolve(&selection.pickup),
            directory.resolve(&selection.dropoff),
        ) {
            (Some(pickup), Some(dropoff)) => (pickup, dropoff),
            _ => {
                tracing::debug!("selection incomplete, nothing to route");
                return None;
            }
        };

        if !sessions.is_live(handle) {
            tracing::debug!("session closed, selection ignored");
            return None;
        }

        sessions.update_markers(handle, Some(pickup), Some(dropoff));

        let ticket = self.request_route(handle, pickup.coordinates, dropoff.coordinates);

        sessions.fit_camera(
            handle,
            &[pickup.coordinates, dropoff.coordinates],
            self.padding,
        );

        Some(ticket)
    }

    /// Issues a request without waiting for it. The answer comes back through the
    /// view's queue as [`Event::RouteResolved`]; a request still unanswered after the
    /// timeout comes back as failed.
    #[tracing::instrument(skip(self))]
    pub fn request_route(
        &mut self,
        handle: SessionHandle,
        from: Coordinates,
        to: Coordinates,
    ) -> RouteTicket {
        self.last_seq += 1;

        let ticket = RouteTicket {
            handle,
            seq: self.last_seq,
            from,
            to,
        };
        self.latest.insert(handle, ticket.seq);

        let routing = self.routing.clone();
        let events = self.events.clone();
        let profile = self.profile;
        let timeout = self.timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, routing.route(from, to, profile)).await
            {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("route #{} timed out after {:?}", ticket.seq, timeout);
                    Err(route_computation_failed_error())
                }
            };

            if events
                .send(Event::RouteResolved(RouteOutcome { ticket, result }))
                .await
                .is_err()
            {
                tracing::debug!("view is gone, dropping route #{}", ticket.seq);
            }
        });

        tracing::info!("requested route #{}", ticket.seq);

        ticket
    }

    #[tracing::instrument(skip(self, sessions, outcome), fields(seq = outcome.ticket.seq))]
    pub fn resolve(&mut self, sessions: &mut SessionManager, outcome: RouteOutcome) -> Resolution {
        let RouteOutcome { ticket, result } = outcome;

        if !sessions.is_live(ticket.handle) {
            tracing::debug!("session closed, discarding route #{}", ticket.seq);
            return Resolution::Stale;
        }

        if self.latest.get(&ticket.handle) != Some(&ticket.seq) {
            tracing::debug!("route #{} superseded, discarding", ticket.seq);
            return Resolution::Stale;
        }

        match result {
            Ok(waypoints) if !waypoints.is_empty() => {
                sessions.update_route(ticket.handle, waypoints);
                Resolution::Applied
            }
            Ok(_) => {
                tracing::warn!("route #{} came back empty", ticket.seq);
                Resolution::Failed(route_computation_failed_error())
            }
            Err(err) => {
                tracing::warn!("route #{} failed: {}", ticket.seq, err);
                Resolution::Failed(route_computation_failed_error())
            }
        }
    }

    /// Drops the bookkeeping for a closed session; later answers for it are stale.
    pub fn forget(&mut self, handle: SessionHandle) {
        self.latest.remove(&handle);
    }

    pub fn latest(&self, handle: SessionHandle) -> Option<u64> {
        self.latest.get(&handle).copied()
    }
}

#[cfg(test)]
fn test_setup(
    routing: DynRouting,
) -> (
    RouteSynchronizer,
    SessionManager,
    SessionHandle,
    crate::surface::SceneSurface,
    async_channel::Receiver<Event>,
) {
    use crate::entities::MapStyle;
    use crate::surface::{AttachmentPoint, SceneSurface};

    let surface = SceneSurface::new();
    surface.attach("map").unwrap();

    let directory = LocationDirectory::reference();
    let mut sessions = SessionManager::new(Box::new(surface.clone()));
    let handle = sessions
        .open(
            &AttachmentPoint {
                element_id: "map".into(),
                width: 800.0,
                height: 600.0,
            },
            directory.resolve("Airport").unwrap(),
            directory.resolve("Gulshan").unwrap(),
            &MapStyle::default(),
        )
        .unwrap();
    sessions.attach_route_overlay(handle);

    let (tx, rx) = async_channel::unbounded();
    let synchronizer = RouteSynchronizer::new(
        routing,
        TravelProfile::Driving,
        50.0,
        Duration::from_secs(10),
        tx,
    );

    (synchronizer, sessions, handle, surface, rx)
}

#[cfg(test)]
fn selection(pickup: &str, dropoff: &str) -> SelectionState {
    SelectionState {
        pickup: pickup.into(),
        dropoff: dropoff.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn newest_request_wins_test() {
    use super::testing::{next_outcome, StraightLine};
    use std::sync::Arc;

    let directory = LocationDirectory::reference();
    let (mut synchronizer, mut sessions, handle, _, rx) = test_setup(Arc::new(StraightLine));

    let first = synchronizer
        .on_selection_change(&mut sessions, handle, &directory, &selection("Dhanmondi", "Uttara"))
        .unwrap();
    let second = synchronizer
        .on_selection_change(&mut sessions, handle, &directory, &selection("Banani", "Airport"))
        .unwrap();
    assert!(second.seq > first.seq);

    // markers already follow the newest selection
    let info = sessions.inspect(handle).unwrap();
    assert_eq!(info.pickup.label, "Pickup: Banani");
    assert_eq!(info.dropoff.label, "Dropoff: Airport");

    let mut outcomes = vec![next_outcome(&rx).await, next_outcome(&rx).await];
    outcomes.sort_by_key(|o| o.ticket.seq);
    let older = outcomes.remove(0);
    let newer = outcomes.remove(0);

    // newest first, then the superseded one straggles in
    assert!(matches!(
        synchronizer.resolve(&mut sessions, newer),
        Resolution::Applied
    ));
    assert!(matches!(
        synchronizer.resolve(&mut sessions, older),
        Resolution::Stale
    ));

    let route = sessions.inspect(handle).unwrap().route;
    assert_eq!(
        route,
        vec![
            directory.resolve("Banani").unwrap().coordinates,
            directory.resolve("Airport").unwrap().coordinates
        ]
    );
}

#[tokio::test]
async fn superseded_result_arriving_first_is_dropped_test() {
    use super::testing::{next_outcome, StraightLine};
    use std::sync::Arc;

    let directory = LocationDirectory::reference();
    let (mut synchronizer, mut sessions, handle, _, rx) = test_setup(Arc::new(StraightLine));

    synchronizer.on_selection_change(&mut sessions, handle, &directory, &selection("Dhanmondi", "Uttara"));
    synchronizer.on_selection_change(&mut sessions, handle, &directory, &selection("Banani", "Airport"));

    let mut outcomes = vec![next_outcome(&rx).await, next_outcome(&rx).await];
    outcomes.sort_by_key(|o| o.ticket.seq);
    let newer = outcomes.remove(1);
    let older = outcomes.remove(0);

    assert!(matches!(
        synchronizer.resolve(&mut sessions, older),
        Resolution::Stale
    ));
    assert!(matches!(
        synchronizer.resolve(&mut sessions, newer),
        Resolution::Applied
    ));

    let route = sessions.inspect(handle).unwrap().route;
    assert_eq!(route[0], directory.resolve("Banani").unwrap().coordinates);
}

#[tokio::test]
async fn result_after_close_touches_nothing_test() {
    use super::testing::{next_outcome, StraightLine};
    use std::sync::Arc;

    let directory = LocationDirectory::reference();
    let (mut synchronizer, mut sessions, handle, surface, rx) = test_setup(Arc::new(StraightLine));

    synchronizer
        .on_selection_change(&mut sessions, handle, &directory, &selection("Uttara", "Banani"))
        .unwrap();

    sessions.close(handle);
    synchronizer.forget(handle);
    let operations = surface.operations();

    let outcome = next_outcome(&rx).await;
    assert!(matches!(
        synchronizer.resolve(&mut sessions, outcome),
        Resolution::Stale
    ));
    assert_eq!(surface.operations(), operations);
}

#[tokio::test]
async fn unresolvable_selection_is_noop_test() {
    use super::testing::StraightLine;
    use std::sync::Arc;

    let directory = LocationDirectory::reference();
    let (mut synchronizer, mut sessions, handle, surface, _rx) = test_setup(Arc::new(StraightLine));

    let before = sessions.inspect(handle).unwrap();
    let operations = surface.operations();

    for (pickup, dropoff) in [("", "Gulshan"), ("Airport", ""), ("Mirpur", "Gulshan"), ("Airport", "Mirpur")] {
        let ticket = synchronizer.on_selection_change(
            &mut sessions,
            handle,
            &directory,
            &selection(pickup, dropoff),
        );
        assert!(ticket.is_none());
    }

    assert_eq!(sessions.inspect(handle).unwrap(), before);
    assert_eq!(surface.operations(), operations);
    assert_eq!(synchronizer.latest(handle), None);
}

#[tokio::test]
async fn failed_route_keeps_previous_test() {
    use super::testing::{next_outcome, Unreachable};
    use std::sync::Arc;

    let directory = LocationDirectory::reference();
    let (mut synchronizer, mut sessions, handle, _, rx) = test_setup(Arc::new(Unreachable));
    let before = sessions.inspect(handle).unwrap().route;

    let ticket = synchronizer
        .on_selection_change(&mut sessions, handle, &directory, &selection("Uttara", "Banani"))
        .unwrap();

    // markers and camera moved even though routing fails
    let info = sessions.inspect(handle).unwrap();
    assert_eq!(info.pickup.position, directory.resolve("Uttara").unwrap().coordinates);

    let outcome = next_outcome(&rx).await;
    assert_eq!(outcome.ticket, ticket);

    match synchronizer.resolve(&mut sessions, outcome) {
        Resolution::Failed(err) => assert!(err.is_route_computation_failed_error()),
        other => panic!("unexpected resolution {:?}", other),
    }

    assert_eq!(sessions.inspect(handle).unwrap().route, before);
}

#[tokio::test]
async fn swap_scenario_test() {
    use super::testing::{next_outcome, PairRouting};
    use crate::entities::{Location, MapStyle, Selection};
    use crate::surface::{AttachmentPoint, SceneSurface};
    use std::sync::Arc;

    let airport = Coordinates::new(23.8513, 90.4061).unwrap();
    let gulshan = Coordinates::new(23.7925, 90.4078).unwrap();
    let path = vec![gulshan, Coordinates::new(23.81, 90.41).unwrap(), airport];

    let directory = LocationDirectory::new(vec![
        Location::new("Airport".into(), airport),
        Location::new("Gulshan".into(), gulshan),
    ])
    .unwrap();

    let surface = SceneSurface::new();
    surface.attach("map").unwrap();
    let mut sessions = SessionManager::new(Box::new(surface.clone()));

    let handle = sessions
        .open(
            &AttachmentPoint {
                element_id: "map".into(),
                width: 800.0,
                height: 600.0,
            },
            directory.resolve("Airport").unwrap(),
            directory.resolve("Gulshan").unwrap(),
            &MapStyle::default(),
        )
        .unwrap();
    sessions.attach_route_overlay(handle);

    let map = surface.map_on("map").unwrap();
    let scene = surface.scene(map).unwrap();
    assert_eq!(scene.markers[0].position, airport);
    assert_eq!(scene.markers[1].position, gulshan);
    assert_eq!(scene.paths.len(), 1);
    assert_eq!(scene.paths[0].waypoints, vec![airport, gulshan]);

    let (tx, rx) = async_channel::unbounded();
    let routing = Arc::new(PairRouting {
        from: gulshan,
        to: airport,
        path: path.clone(),
    });
    let mut synchronizer = RouteSynchronizer::new(
        routing,
        TravelProfile::Driving,
        50.0,
        Duration::from_secs(10),
        tx,
    );
    let mut selection = Selection::new();

    selection.set_pickup("Gulshan".into());
    assert!(synchronizer
        .on_selection_change(&mut sessions, handle, &directory, selection.state())
        .is_none());

    selection.set_dropoff("Airport".into());
    let ticket = synchronizer
        .on_selection_change(&mut sessions, handle, &directory, selection.state())
        .unwrap();
    assert_eq!((ticket.from, ticket.to), (gulshan, airport));

    let scene = surface.scene(map).unwrap();
    assert_eq!(scene.markers[0].position, gulshan);
    assert_eq!(scene.markers[0].label, "Pickup: Gulshan");
    assert_eq!(scene.markers[1].position, airport);
    assert_eq!(scene.markers[1].label, "Dropoff: Airport");

    let outcome = next_outcome(&rx).await;
    assert!(matches!(
        synchronizer.resolve(&mut sessions, outcome),
        Resolution::Applied
    ));

    let scene = surface.scene(map).unwrap();
    assert_eq!(scene.paths.len(), 1);
    assert_eq!(scene.paths[0].waypoints, path);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_test() {
    use super::testing::{next_outcome, Gated};
    use std::sync::Arc;

    let directory = LocationDirectory::reference();
    let (mut synchronizer, mut sessions, handle, _, rx) = test_setup(Arc::new(Gated::new()));
    let before = sessions.inspect(handle).unwrap().route;

    let issued = tokio::time::Instant::now();
    let ticket = synchronizer
        .on_selection_change(&mut sessions, handle, &directory, &selection("Uttara", "Banani"))
        .unwrap();

    let outcome = next_outcome(&rx).await;
    assert_eq!(outcome.ticket, ticket);
    assert!(issued.elapsed() >= Duration::from_secs(10));

    match synchronizer.resolve(&mut sessions, outcome) {
        Resolution::Failed(err) => assert!(err.is_route_computation_failed_error()),
        other => panic!("unexpected resolution {:?}", other),
    }
    assert_eq!(sessions.inspect(handle).unwrap().route, before);
}
