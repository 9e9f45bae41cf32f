use axum::extract::{Extension, Json, Path};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{SessionHandle, ViewSnapshot};
use crate::entities::SelectionEvent;
use crate::error::Error;
use crate::server::DynAPI;
use crate::surface::AttachmentPoint;

#[derive(Serialize, Deserialize)]
pub struct CreatedView {
    id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct MountedView {
    handle: SessionHandle,
}

pub async fn create(Extension(api): Extension<DynAPI>) -> Result<Json<CreatedView>, Error> {
    let id = api.create_view().await?;

    Ok(CreatedView { id }.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewSnapshot>, Error> {
    let view = api.find_view(id).await?;

    Ok(view.into())
}

pub async fn mount(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(attachment): Json<AttachmentPoint>,
) -> Result<Json<MountedView>, Error> {
    let handle = api.mount_view(id, attachment).await?;

    Ok(MountedView { handle }.into())
}

pub async fn unmount(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewSnapshot>, Error> {
    api.unmount_view(id).await?;
    let view = api.find_view(id).await?;

    Ok(view.into())
}

/// Events on one view are handled in order, so the snapshot already reflects the edit.
pub async fn update_selection(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(event): Json<SelectionEvent>,
) -> Result<Json<ViewSnapshot>, Error> {
    api.update_selection(id, event).await?;
    let view = api.find_view(id).await?;

    Ok(view.into())
}

pub async fn destroy(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    api.destroy_view(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
