use std::sync::Arc;

use actix_web::{middleware::Logger, post, web::Data, App, HttpServer, Responder};
use clap::Parser;

mod api;
mod broadcast;
mod config;
mod executor;
mod judge;
mod persistent;
mod ranking;

use broadcast::Hub;
use config::{Args, Config};
use executor::{Executor, Piston};
use persistent::{models, DbPool};

const POOL_SIZE: u32 = 8;
const EVENT_BUFFER: usize = 64;

// DO NOT REMOVE: used in automatic testing
#[post("/internal/exit")]
#[allow(unreachable_code)]
async fn exit() -> impl Responder {
    log::info!("Shutdown as requested");
    std::process::exit(0);
    "Exited".to_string()
}

/// Insert the configured problems when the database has none
fn seed_problems(pool: &DbPool, config: &Config) -> Result<(), api::err::Error> {
    let conn = &mut pool.get()?;
    if config.problems.is_empty() || models::problems_count(conn)? > 0 {
        return Ok(());
    }

    log::info!("Seeding {} problem(s)", config.problems.len());
    for form in &config.problems {
        api::problems::create(conn, form.clone())?;
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let config = args.config;

    // Delete existing database
    if args.flush_data {
        log::info!("Flushing persistent data");
        if let Err(err) = std::fs::remove_file(&config.database) {
            log::warn!("Unable to remove database: {err}");
        }
        // Leftover write-ahead log files belong to the removed database
        for suffix in ["-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", config.database));
        }
    }

    let pool = persistent::create_pool(&config.database, POOL_SIZE)
        .expect("Failed to create database pool");
    persistent::run_migrations(&pool).expect("Failed to run migrations");
    seed_problems(&pool, &config).expect("Failed to seed problems");

    let executor: Arc<dyn Executor> =
        Arc::new(Piston::new(config.executor.clone()).expect("Failed to build HTTP client"));
    let executor = Data::from(executor);
    let hub = Data::new(Hub::new(EVENT_BUFFER));

    let bind = (config.server.bind_address.clone(), config.server.bind_port);
    log::info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(pool.clone()))
            .app_data(executor.clone())
            .app_data(hub.clone())
            .configure(api::routes)
            // DO NOT REMOVE: used in automatic testing
            .service(exit)
    })
    .bind(bind)?
    .run()
    .await
}
