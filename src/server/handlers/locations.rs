use axum::extract::{Extension, Json};

use crate::entities::Location;
use crate::error::Error;
use crate::server::DynAPI;

pub async fn list(Extension(api): Extension<DynAPI>) -> Result<Json<Vec<Location>>, Error> {
    let locations = api.list_locations().await?;

    Ok(locations.into())
}
