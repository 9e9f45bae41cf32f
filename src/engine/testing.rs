use std::sync::Arc;

use async_channel::Receiver;
use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{Event, RouteOutcome};
use crate::api::RoutingService;
use crate::entities::{Coordinates, TravelProfile};
use crate::error::{upstream_error, Error};

/// Returns `path` for the `from -> to` pair and the straight segment for anything else.
pub struct PairRouting {
    pub from: Coordinates,
    pub to: Coordinates,
    pub path: Vec<Coordinates>,
}

#[async_trait]
impl RoutingService for PairRouting {
    async fn route(
        &self,
        from: Coordinates,
        to: Coordinates,
        _: TravelProfile,
    ) -> Result<Vec<Coordinates>, Error> {
        if from == self.from && to == self.to {
            return Ok(self.path.clone());
        }

        Ok(vec![from, to])
    }
}

pub struct StraightLine;

#[async_trait]
impl RoutingService for StraightLine {
    async fn route(
        &self,
        from: Coordinates,
        to: Coordinates,
        _: TravelProfile,
    ) -> Result<Vec<Coordinates>, Error> {
        Ok(vec![from, to])
    }
}

pub struct Unreachable;

#[async_trait]
impl RoutingService for Unreachable {
    async fn route(&self, _: Coordinates, _: Coordinates, _: TravelProfile) -> Result<Vec<Coordinates>, Error> {
        Err(upstream_error())
    }
}

/// Straight-line routing that holds every answer until the test hands out a permit.
#[derive(Clone)]
pub struct Gated {
    pub permits: Arc<Semaphore>,
}

impl Gated {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }
}

#[async_trait]
impl RoutingService for Gated {
    async fn route(
        &self,
        from: Coordinates,
        to: Coordinates,
        _: TravelProfile,
    ) -> Result<Vec<Coordinates>, Error> {
        match self.permits.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return Err(upstream_error()),
        }

        Ok(vec![from, to])
    }
}

pub async fn next_outcome(events: &Receiver<Event>) -> RouteOutcome {
    loop {
        match events.recv().await {
            Ok(Event::RouteResolved(outcome)) => return outcome,
            Ok(_) => continue,
            Err(_) => panic!("event queue closed"),
        }
    }
}
