pub mod backup_config;
pub mod bundle_export;
pub mod csv_import;
pub mod csv_record;
pub mod csv_verify;
pub mod database_validator;
pub mod entity;
pub mod entity_export;
pub mod full_import;
pub mod records;
pub mod retention;
pub mod scheduler;
pub mod snapshot;
