use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;

mod api;
mod auth;
mod clock;
mod config;
mod db;
mod docs;
mod engine;
mod error;
mod model;
mod models;
mod routes;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::auth::jwt::generate_access_token;
use crate::docs::ApiDoc;
use crate::engine::PayrollEngine;
use crate::model::{role::Role, user::User};
use crate::store::{MemoryStore, MySqlStore, Store};
use crate::utils::payslip_cache::PayslipCache;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_TOKEN_TTL_SECS: usize = 60 * 60;

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if !config.uses_memory_store() {
        let pool = init_db(&config.database_url).await?;
        return Ok(Arc::new(MySqlStore::new(pool)));
    }

    warn!("Using the in-memory store; nothing survives a restart");

    let users: Vec<User> = match &config.seed_users_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of users", path.display()))?
        }
        None => Vec::new(),
    };
    info!(users = users.len(), "Seeded in-memory store");

    Ok(Arc::new(MemoryStore::with_users(users)))
}

/// `issue-token <user_id> <username> <admin|employee> [ttl_secs]` prints a bearer token.
fn issue_token(config: &Config, args: &[String]) -> anyhow::Result<()> {
    let [user_id, username, role, rest @ ..] = args else {
        anyhow::bail!("usage: issue-token <user_id> <username> <admin|employee> [ttl_secs]");
    };

    let user_id: u64 = user_id.parse().context("user_id must be a number")?;
    let role = Role::from_str(role).with_context(|| format!("unknown role `{role}`"))?;
    let ttl = match rest.first() {
        Some(ttl) => ttl.parse().context("ttl_secs must be a number")?,
        None => DEFAULT_TOKEN_TTL_SECS,
    };

    let token = generate_access_token(user_id, username.clone(), role, &config.jwt_secret, ttl)
        .context("Failed to sign token")?;
    println!("{token}");
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("issue-token") {
        return issue_token(&config, &args[1..]);
    }

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");
    if let clock::Clock::Fixed(at) = config.clock {
        warn!(%at, "Clock frozen by FAKETIME");
    }

    let store = open_store(&config).await?;
    let engine = PayrollEngine::new(store, PayslipCache::new(config.payslip_cache_capacity));

    let per_min = config.rate_protected_per_min.max(1);
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / u64::from(per_min)).max(1))
        .burst_size(per_min)
        .finish()
        .context("Invalid rate limit configuration")?;

    let server_addr = config.server_addr.clone();
    let clock = config.clock;

    HttpServer::new(move || {
        let api_prefix = config.api_prefix.clone();

        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .wrap(Governor::new(&governor_conf))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard so JS/CSS assets resolve
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(engine.clone()))
            .app_data(Data::new(clock))
            .configure(|cfg| routes::configure(cfg, &api_prefix))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
