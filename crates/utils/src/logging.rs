use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events follow `RUST_LOG`; everything else stays at `warn`.
const WORKSPACE_CRATES: [&str; 4] = ["backup_cli", "services", "db", "utils"];

fn filter_string(level: &str) -> String {
    let mut filter = String::from("warn");
    for krate in WORKSPACE_CRATES {
        filter.push_str(&format!(",{krate}={level}"));
    }
    filter
}

/// Install the stderr subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(filter_string(&log_level))
        .unwrap_or_else(|_| EnvFilter::new(filter_string("info")));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(env_filter),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_string_scopes_workspace_crates() {
        assert_eq!(
            filter_string("debug"),
            "warn,backup_cli=debug,services=debug,db=debug,utils=debug"
        );
    }
}
