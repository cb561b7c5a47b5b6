use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use gatehouse_admin::{SeedReport, seed_defaults};
use gatehouse_auth::NewPrincipal;
use gatehouse_infra::{InMemoryStore, PostgresStore, StoreConfig};

const ADMIN_EMAIL_VAR: &str = "GATEHOUSE_ADMIN_EMAIL";
const ADMIN_PASSWORD_HASH_VAR: &str = "GATEHOUSE_ADMIN_PASSWORD_HASH";

fn admin_account() -> anyhow::Result<Option<NewPrincipal>> {
    let (Ok(email), Ok(hash)) = (
        std::env::var(ADMIN_EMAIL_VAR),
        std::env::var(ADMIN_PASSWORD_HASH_VAR),
    ) else {
        return Ok(None);
    };
    let account = NewPrincipal::new(email, hash, Some("Administrator".to_owned()))
        .context("invalid bootstrap admin account")?;
    Ok(Some(account))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let config = StoreConfig::from_env().context("invalid store configuration")?;
    let admin = admin_account()?;

    let report: SeedReport = match config {
        StoreConfig::InMemory => {
            warn!("no database configured, seeding an in-memory store that is discarded on exit");
            let store = Arc::new(InMemoryStore::new());
            seed_defaults(store.as_ref(), admin).await?
        }
        StoreConfig::Postgres { url, max_connections } => {
            let store = PostgresStore::connect(&url, max_connections)
                .await
                .context("failed to connect to postgres")?;
            store.migrate().await.context("schema migration failed")?;
            seed_defaults(&store, admin).await?
        }
    };

    info!(
        permissions_created = report.permissions_created,
        admin_role = %report.admin_role,
        admin_role_created = report.admin_role_created,
        user_role = %report.user_role,
        admin_user = ?report.admin_user,
        "seed complete"
    );
    Ok(())
}
