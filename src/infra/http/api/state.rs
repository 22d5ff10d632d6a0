use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::catalog::CatalogService;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<CatalogService>,
    /// Cancelled once the shutdown grace period has run out. Stopping the
    /// listener is driven by a separate token, see [`crate::infra::http::serve`].
    pub requests: CancellationToken,
    /// `None` when the catalog runs on the in-process store.
    pub db: Option<PostgresRepositories>,
}

impl ApiState {
    pub fn new(
        catalog: Arc<CatalogService>,
        requests: CancellationToken,
        db: Option<PostgresRepositories>,
    ) -> Self {
        Self {
            catalog,
            requests,
            db,
        }
    }

    /// Token for one request; fires when in-flight work is abandoned.
    pub fn request_token(&self) -> CancellationToken {
        self.requests.child_token()
    }
}
