//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Storage;
use crate::services::auth::TokenIssuer;
use crate::services::{AuthService, CatalogService, OrderService, UserService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the services,
/// each borrowing the stores it needs.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    storage: Storage,
    tokens: TokenIssuer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `storage` - Persistence backend
    #[must_use]
    pub fn new(config: ApiConfig, storage: Storage) -> Self {
        let tokens = TokenIssuer::new(config.token_secret.clone(), config.token_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                tokens,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the persistence backend.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    #[must_use]
    pub fn auth_service(&self) -> AuthService<'_> {
        AuthService::new(
            &self.inner.storage,
            &self.inner.tokens,
            self.inner.config.reset_token_ttl,
        )
    }

    #[must_use]
    pub fn user_service(&self) -> UserService<'_> {
        UserService::new(self.inner.storage.users.as_ref())
    }

    #[must_use]
    pub fn catalog_service(&self) -> CatalogService<'_> {
        CatalogService::new(self.inner.storage.products.as_ref())
    }

    #[must_use]
    pub fn order_service(&self) -> OrderService<'_> {
        OrderService::new(
            self.inner.storage.products.as_ref(),
            self.inner.storage.orders.as_ref(),
            self.inner.config.empty_orders_not_found,
        )
    }
}
