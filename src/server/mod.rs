mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, patch, post, put},
    Router,
};

use crate::api::API;
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{auth, locations, views};

type DynAPI = Arc<dyn API + Send + Sync>;

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/locations", get(locations::list))
        .route("/views", post(views::create))
        .route("/views/:id", get(views::find).delete(views::destroy))
        .route("/views/:id/mount", put(views::mount).delete(views::unmount))
        .route("/views/:id/selection", patch(views::update_selection))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .layer(Extension(api))
}

/// Serves until ctrl-c, then stops every view so their sessions are released.
pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let api = Arc::new(api) as DynAPI;
    let app = router(api.clone());

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {}", err);
            }
        })
        .await
        .map_err(|err| {
            tracing::error!("server error: {}", err);
            unexpected_error()
        })?;

    tracing::info!("shutting down");

    api.shutdown().await
}
