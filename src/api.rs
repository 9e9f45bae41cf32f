use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::{SessionHandle, ViewSnapshot};
use crate::entities::{
    AuthSession, Coordinates, Credentials, Location, Registration, SelectionEvent, TravelProfile,
    User,
};
use crate::error::Error;
use crate::surface::AttachmentPoint;

/// External path computation. Implementations may be slow, may fail, and may resolve
/// out of order relative to issue.
#[async_trait]
pub trait RoutingService {
    async fn route(
        &self,
        from: Coordinates,
        to: Coordinates,
        profile: TravelProfile,
    ) -> Result<Vec<Coordinates>, Error>;
}

pub type DynRouting = Arc<dyn RoutingService + Send + Sync>;

#[async_trait]
pub trait LocationAPI {
    async fn list_locations(&self) -> Result<Vec<Location>, Error>;
}

#[async_trait]
pub trait ViewAPI {
    async fn create_view(&self) -> Result<Uuid, Error>;
    async fn find_view(&self, id: Uuid) -> Result<ViewSnapshot, Error>;
    async fn mount_view(&self, id: Uuid, attachment: AttachmentPoint)
        -> Result<SessionHandle, Error>;
    async fn unmount_view(&self, id: Uuid) -> Result<(), Error>;
    async fn update_selection(&self, id: Uuid, event: SelectionEvent) -> Result<(), Error>;
    async fn destroy_view(&self, id: Uuid) -> Result<(), Error>;
    /// Stops every view, closing their sessions.
    async fn shutdown(&self) -> Result<(), Error>;
}

#[async_trait]
pub trait AuthAPI {
    async fn login(&self, credentials: Credentials) -> Result<AuthSession, Error>;
    async fn register(&self, registration: Registration) -> Result<User, Error>;
    async fn logout(&self, token: &str) -> Result<(), Error>;
    /// The account behind `token`, `None` when it is not signed in.
    async fn current_user(&self, token: &str) -> Result<Option<User>, Error>;
}

pub trait API: LocationAPI + ViewAPI + AuthAPI {}
