use friendgraph::application_impl::*;
use friendgraph::application_port::*;
use friendgraph::domain_model::UserId;
use friendgraph::domain_port::EdgeStore;
use friendgraph::infra_memory::MemoryEdgeStore;
use friendgraph::infra_mysql::MySqlEdgeStore;
use friendgraph::logger::*;
use friendgraph::settings::*;
use sqlx::{MySql, Pool};
use std::sync::Arc;

async fn open_edge_store(settings: &Settings) -> anyhow::Result<Arc<dyn EdgeStore>> {
    match settings.edge_store.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryEdgeStore::new())),
        "mysql" => {
            let dsn = settings
                .edge_store
                .dsn
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("edge_store.dsn is required for the mysql backend"))?;
            let pool = Pool::<MySql>::connect(dsn).await?;
            Ok(Arc::new(MySqlEdgeStore::new(pool)))
        }
        other => Err(anyhow::anyhow!("unknown edge_store.backend: {other:?}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let edge_store = open_edge_store(&project_settings).await?;
    let me = cli.user.unwrap_or_else(UserId::new_v4);

    let coordinator = ConsistencyCoordinator::new(
        me,
        edge_store,
        CoordinatorConfig::from(&project_settings.coordinator),
    );
    let resolver = StatusResolver::new(
        coordinator.clone(),
        ResolverConfig::from(&project_settings.resolver),
    );

    let snapshot = coordinator.force_refresh().await?;
    info!(
        "session {me} synced: {} friends, generation {}",
        snapshot.friend_count(),
        snapshot.generation()
    );
    println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);

    for (user_id, status) in resolver.status_many(&cli.status_of).await {
        println!("{user_id}\t{}", serde_json::to_string(&status)?);
    }

    coordinator.shutdown();
    Ok(())
}
