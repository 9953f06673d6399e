use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use founder_match::config::Settings;
use founder_match::core::Matcher;
use founder_match::engine::{MatchSynchronizer, RankedQueryService, RecomputeTrigger, RetryPolicy, SyncPolicy};
use founder_match::routes::{
    self, handle_json_payload_error, handle_path_error, handle_query_payload_error, AppState,
    ListLimits, ViewerAuth,
};
use founder_match::services::{
    AppwriteClient, AppwriteCollections, CacheManager, CachedProfiles, MatchStore,
    PostgresMatchStore, ProfileRepository,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", what, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", what, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let loaded = Settings::load();
    match &loaded {
        Ok(settings) => init_logging(&settings.logging.level, &settings.logging.format),
        Err(_) => init_logging("info", "json"),
    }

    info!("Starting founder match service...");

    let settings = loaded.map_err(|e| startup_error("Configuration error", e))?;
    settings
        .validate()
        .map_err(|e| startup_error("Invalid configuration", e))?;
    let policy = settings
        .scoring
        .to_policy()
        .map_err(|e| startup_error("Invalid scoring policy", e))?;

    info!("Configuration loaded successfully");

    // Initialize Appwrite client
    let appwrite_collections = AppwriteCollections {
        talent_profiles: settings.collection.talent_profiles.clone(),
        startups: settings.collection.startups.clone(),
    };

    let appwrite = AppwriteClient::new(
        settings.appwrite.endpoint.clone(),
        settings.appwrite.api_key.clone(),
        settings.appwrite.project_id.clone(),
        settings.appwrite.database_id.clone(),
        appwrite_collections,
    )
    .map_err(|e| startup_error("Failed to build Appwrite client", e))?;

    info!("Appwrite client initialized");

    // Initialize read-model cache (Redis tier is optional)
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(10_000);

    let cache = match &settings.cache.redis_url {
        Some(redis_url) => match CacheManager::new(redis_url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized (L1: {} entries, L2: redis, TTL: {}s)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), using in-process cache only", e);
                CacheManager::local(l1_cache_size, cache_ttl)
            }
        },
        None => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);
            CacheManager::local(l1_cache_size, cache_ttl)
        }
    };

    let profiles: Arc<dyn ProfileRepository> = Arc::new(CachedProfiles::new(appwrite, Arc::new(cache)));

    // Initialize PostgreSQL match store
    let store: Arc<dyn MatchStore> = Arc::new(
        PostgresMatchStore::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );

    info!("PostgreSQL match store initialized");

    // Wire the engine
    let sync_policy = SyncPolicy {
        max_conflict_retries: settings.sync.max_conflict_retries,
        store_retry: RetryPolicy::new(settings.sync.max_store_retries, settings.sync.backoff_base_ms),
        max_in_flight: settings.sync.max_in_flight,
    };
    let sync = Arc::new(MatchSynchronizer::new(store.clone(), sync_policy));

    info!("Matcher initialized with stage bonus: {:?}", policy.stage_bonus);

    let trigger = Arc::new(RecomputeTrigger::new(
        profiles.clone(),
        Matcher::new(policy),
        sync,
        settings.matching.candidate_limit,
    ));
    let ranking = Arc::new(RankedQueryService::new(profiles.clone(), store.clone()));

    let (events, receiver) = mpsc::channel(settings.sync.event_buffer.max(1));
    let listener = trigger.clone().spawn_change_listener(receiver);

    // Build application state
    let app_state = AppState {
        trigger,
        ranking,
        profiles,
        store,
        events,
        limits: ListLimits {
            default_limit: settings.matching.default_limit,
            max_limit: settings.matching.max_limit,
        },
    };
    let auth = web::Data::new(ViewerAuth::new(
        &settings.auth.jwt_secret,
        settings.auth.jwt_issuer.as_deref(),
    ));

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(auth.clone())
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    // Every sender lives in the app state, so the listener drains and stops
    match tokio::time::timeout(Duration::from_secs(10), listener).await {
        Ok(Ok(())) => info!("Change listener drained"),
        Ok(Err(e)) => error!("Change listener failed: {}", e),
        Err(_) => warn!("Change listener did not stop within 10s"),
    }

    result
}
