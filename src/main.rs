// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use fedcatrs::config::settings::{CacheBackend, RegistryBackend, Settings};
use fedcatrs::crawler::{
    BackoffPolicy, CrawlWorker, CrawlerEngine, CrawlerManager, StoreGuard, StoreGuardConfig,
};
use fedcatrs::domain::repositories::catalog_cache::CatalogCache;
use fedcatrs::domain::repositories::target_registry::TargetRegistry;
use fedcatrs::domain::services::query_service::{AllowAllPolicy, QueryService};
use fedcatrs::engines::dsp_client::{DspCatalogClient, StaticTokenProvider};
use fedcatrs::infrastructure::database::connection;
use fedcatrs::infrastructure::repositories::memory_catalog_cache::MemoryCatalogCache;
use fedcatrs::infrastructure::repositories::memory_target_registry::MemoryTargetRegistry;
use fedcatrs::infrastructure::repositories::redis_catalog_cache::RedisCatalogCache;
use fedcatrs::infrastructure::repositories::sql_catalog_cache::SqlCatalogCache;
use fedcatrs::infrastructure::repositories::sql_target_registry::SqlTargetRegistry;
use fedcatrs::presentation::routes;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use fedcatrs::utils::telemetry;
use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting fedcatrs...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // Initialize Prometheus Metrics
    fedcatrs::infrastructure::metrics::init_metrics(settings.server.metrics_port);

    // 3. Connect to database when a SQL backend is selected
    let needs_db = settings.registry.backend == RegistryBackend::Sql
        || settings.cache.backend == CacheBackend::Sql;
    let db = if needs_db {
        let pool = connection::create_pool(&settings.database).await?;
        info!("Database connection established");

        // Run database migrations
        info!("Running database migrations...");
        Migrator::up(&pool, None).await?;
        info!("Database migrations applied");

        Some(Arc::new(pool))
    } else {
        None
    };

    // 4. Initialize backends
    let registry: Arc<dyn TargetRegistry> = match settings.registry.backend {
        RegistryBackend::Sql => {
            let db = db
                .clone()
                .ok_or_else(|| anyhow::anyhow!("sql registry backend requires a database"))?;
            Arc::new(SqlTargetRegistry::new(db))
        }
        RegistryBackend::Memory => Arc::new(MemoryTargetRegistry::new()),
    };

    let (cache, cache_backend): (Arc<dyn CatalogCache>, &str) = match settings.cache.backend {
        CacheBackend::Sql => {
            let db = db
                .clone()
                .ok_or_else(|| anyhow::anyhow!("sql cache backend requires a database"))?;
            (Arc::new(SqlCatalogCache::new(db)), "sql")
        }
        CacheBackend::Redis => (
            Arc::new(RedisCatalogCache::new(&settings.redis.url)?),
            "redis",
        ),
        CacheBackend::Memory => (Arc::new(MemoryCatalogCache::new()), "memory"),
    };
    info!(
        registry = ?settings.registry.backend,
        cache = ?settings.cache.backend,
        "Backends initialized"
    );

    // 启动时本进程尚无在途尝试，任何非Idle的调度状态都是上次运行的残留
    let reset = registry.reset_stuck(chrono::Duration::zero()).await?;
    if reset > 0 {
        info!("Reset {} stuck targets from previous run", reset);
    }

    // 5. Initialize fetcher
    let credentials = Arc::new(StaticTokenProvider::new(settings.fetcher.auth_token.clone()));
    let fetcher = DspCatalogClient::new(
        Duration::from_secs(settings.fetcher.request_timeout_secs),
        credentials,
    );

    // 6. Assemble crawler
    let store_guard = Arc::new(StoreGuard::new(cache_backend, StoreGuardConfig::default()));
    let backoff = BackoffPolicy {
        failure_threshold: settings.crawler.failure_threshold,
        max_interval: Duration::from_secs(settings.crawler.backoff_max_interval_secs),
        ..BackoffPolicy::default()
    };
    let worker = CrawlWorker::new(
        registry.clone(),
        cache.clone(),
        fetcher,
        store_guard.clone(),
        backoff,
        Duration::from_secs(settings.crawler.attempt_timeout_secs),
    );
    let engine = CrawlerEngine::new(
        registry.clone(),
        cache.clone(),
        worker,
        store_guard.clone(),
        settings.crawler.concurrency,
        Duration::from_secs(settings.crawler.tick_secs),
        Duration::from_secs(settings.crawler.execution_delay_secs),
    );

    // 7. Start crawler
    let mut manager = CrawlerManager::start(
        &engine,
        Duration::from_secs(settings.crawler.shutdown_grace_secs),
    );

    // 8. Start HTTP server
    let query_service = Arc::new(QueryService::new(cache.clone(), Arc::new(AllowAllPolicy)));
    let app = routes::routes(query_service);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => result?,
        _ = manager.wait_for_shutdown() => {
            info!("Crawler stopped, shutting down server");
        }
    }

    Ok(())
}
