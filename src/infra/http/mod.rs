pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};
pub use middleware::RequestContext;

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, middleware as axum_middleware, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::infra::error::InfraError;

use middleware::{log_responses, set_request_context};

/// Full HTTP surface: the product API plus health probes.
pub fn build_router(state: ApiState) -> Router {
    build_api_router()
        .route("/health/db", get(db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// How long cancelled requests get to write their responses before the
/// remaining connections are dropped.
const CANCELLED_DRAIN: Duration = Duration::from_secs(5);

/// Serves `router` until `shutdown` fires.
///
/// Shutdown stops accepting connections and lets in-flight requests finish.
/// If they are still running after `grace`, `requests` is cancelled so the
/// catalog abandons their store work, and the server gets [`CANCELLED_DRAIN`]
/// to flush the resulting responses.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    requests: CancellationToken,
    grace: Duration,
) -> Result<(), InfraError> {
    let stop_accepting = shutdown.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { stop_accepting.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(InfraError::from),
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {}
    }

    warn!(
        target = "vitrine::http",
        grace_ms = grace.as_millis() as u64,
        "Graceful shutdown timed out; cancelling in-flight requests"
    );
    requests.cancel();

    match tokio::time::timeout(CANCELLED_DRAIN, &mut server).await {
        Ok(result) => result.map_err(InfraError::from),
        Err(_) => {
            info!(target = "vitrine::http", "Dropping remaining connections");
            Ok(())
        }
    }
}

async fn db_health(State(state): State<ApiState>) -> Result<StatusCode, AppError> {
    // The in-process store has nothing to probe.
    let Some(db) = state.db.as_ref() else {
        return Ok(StatusCode::NO_CONTENT);
    };

    db.health_check()
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}
