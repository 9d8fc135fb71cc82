use job_board::config::DatabaseConfig;
use job_board::error::AppError;
use job_board::marketplace::{MarketplaceService, MarketplaceStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Applies a `--database` override on top of the configured location.
pub(crate) fn database_config(
    mut config: DatabaseConfig,
    override_path: Option<PathBuf>,
) -> DatabaseConfig {
    if let Some(path) = override_path {
        config.path = path;
    }
    config
}

pub(crate) fn open_service(config: &DatabaseConfig) -> Result<MarketplaceService, AppError> {
    let store = MarketplaceStore::from_config(config)?;
    info!(
        path = %config.path.display(),
        policy = ?store.policy(),
        "marketplace store ready"
    );
    Ok(MarketplaceService::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use job_board::marketplace::TransitionPolicy;

    fn config() -> DatabaseConfig {
        DatabaseConfig {
            path: PathBuf::from("job_marketplace.db"),
            status_policy: TransitionPolicy::Strict,
        }
    }

    #[test]
    fn override_replaces_only_the_path() {
        let config = database_config(config(), Some(PathBuf::from(":memory:")));
        assert!(config.is_in_memory());
        assert_eq!(config.status_policy, TransitionPolicy::Strict);

        let untouched = database_config(self::config(), None);
        assert_eq!(untouched.path, PathBuf::from("job_marketplace.db"));
    }

    #[test]
    fn opens_in_memory_service() {
        let config = database_config(config(), Some(PathBuf::from(":memory:")));
        let service = open_service(&config).expect("service opens");
        let store = service.into_store().expect("store returned");
        assert_eq!(store.policy(), TransitionPolicy::Strict);
        assert_eq!(store.count_users().expect("counts"), 0);
    }
}
