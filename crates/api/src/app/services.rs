//! Shared request-handling services (stores, token service) and their startup wiring.

use anyhow::Context;

use roster_auth::TokenService;
use roster_infra::{db, seed, Settings, Stores};

pub struct AppServices {
    pub stores: Stores,
    pub tokens: TokenService,
    /// Mount point of the API routes; empty means the root.
    pub api_prefix: String,
}

impl AppServices {
    pub fn new(stores: Stores, tokens: TokenService, api_prefix: impl Into<String>) -> Self {
        Self {
            stores,
            tokens,
            api_prefix: api_prefix.into(),
        }
    }

    /// Connect storage, apply the schema and seed builtin data.
    pub async fn bootstrap(settings: &Settings) -> anyhow::Result<Self> {
        let stores = if settings.use_in_memory_stores {
            tracing::warn!("using in-memory stores; data will not survive a restart");
            Stores::in_memory()
        } else {
            let url = settings
                .database_url
                .as_deref()
                .context("DATABASE_URL is required unless USE_IN_MEMORY_STORES is set")?;
            let pool = db::connect(url)
                .await
                .context("failed to connect to the database")?;
            db::ensure_schema(&pool)
                .await
                .context("failed to apply the database schema")?;
            Stores::postgres(pool)
        };

        seed(&stores, settings.seed_admin.as_ref())
            .await
            .context("failed to seed builtin roles and permissions")?;

        let tokens = TokenService::new(settings.secret_key.as_bytes(), settings.access_token_ttl);
        Ok(Self::new(stores, tokens, settings.api_prefix.clone()))
    }
}
