//! Command line front ends for the backup toolkit: `restore-from-csv` and `backup`.

pub mod backup;
pub mod output;
pub mod restore;

use std::str::FromStr;

use anyhow::Context;
use db::DBService;
use services::services::entity::EntityKind;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://flowers.db";

/// Open the store, applying pending migrations.
pub async fn open_store(database_url: &str) -> anyhow::Result<DBService> {
    DBService::connect(database_url)
        .await
        .with_context(|| format!("failed to open database {database_url}"))
}

/// Clap value parser listing the accepted entity names on error.
pub fn parse_entity(value: &str) -> Result<EntityKind, String> {
    EntityKind::from_str(value).map_err(|_| {
        let names: Vec<String> = EntityKind::IMPORT_ORDER.iter().map(ToString::to_string).collect();
        format!("unknown entity '{value}', expected one of: {}", names.join(", "))
    })
}
