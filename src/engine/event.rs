use tokio::sync::oneshot;

use super::{SessionHandle, ViewSnapshot};
use crate::entities::{Coordinates, SelectionEvent};
use crate::error::Error;
use crate::surface::AttachmentPoint;

/// A route request in flight, tagged with its issue order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteTicket {
    pub handle: SessionHandle,
    pub seq: u64,
    pub from: Coordinates,
    pub to: Coordinates,
}

#[derive(Debug)]
pub struct RouteOutcome {
    pub ticket: RouteTicket,
    pub result: Result<Vec<Coordinates>, Error>,
}

/// Everything a view reacts to. Each view drains its own queue one event at a time.
#[derive(Debug)]
pub enum Event {
    Mount {
        attachment: AttachmentPoint,
        reply: Option<oneshot::Sender<Result<SessionHandle, Error>>>,
    },
    Unmount,
    Select(SelectionEvent),
    OverlayDue(SessionHandle),
    RouteResolved(RouteOutcome),
    Snapshot(oneshot::Sender<ViewSnapshot>),
    Shutdown,
}
