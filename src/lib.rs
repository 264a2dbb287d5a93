pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod retention;
pub mod routes;
pub mod store;
pub mod unfurl;

use config::Config;
use engine::Engine;
use rocket_cors::CorsOptions;
use std::sync::Arc;
use std::time::Instant;
use store::SnapshotStore;
use unfurl::UnfurlResolver;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    build_rocket(Config::from_env())
}

pub fn rocket_with_config(config: Config) -> rocket::Rocket<rocket::Build> {
    build_rocket(config)
}

fn build_rocket(config: Config) -> rocket::Rocket<rocket::Build> {
    std::fs::create_dir_all(&config.rooms_dir).ok();
    std::fs::create_dir_all(&config.assets_dir).ok();

    let config = Arc::new(config);
    let store = Arc::new(SnapshotStore::new(
        config.rooms_dir.clone(),
        config.assets_dir.clone(),
    ));
    let engine = Engine::new(store.clone());
    let resolver = Arc::new(UnfurlResolver::new());

    let cors = CorsOptions::default()
        .to_cors()
        .expect("failed to build CORS fairing");

    let figment = rocket::Config::figment().merge(("port", config.port));

    let liftoff_store = store.clone();
    let liftoff_engine = engine.clone();
    let liftoff_config = config.clone();

    let shutdown_engine = engine.clone();

    rocket::custom(figment)
        .manage(store)
        .manage(engine)
        .manage(resolver)
        .manage(config)
        .manage(Instant::now())
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::not_found, routes::payload_too_large],
        )
        .mount(
            "/",
            rocket::routes![
                gateway::connect,
                routes::upload_asset,
                routes::download_asset,
                routes::unfurl,
                routes::health,
                routes::api_health,
                routes::list_rooms,
                routes::list_assets,
                routes::stats,
                routes::run_sweep_now,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Retention Sweeper",
            move |_rocket| {
                Box::pin(async move {
                    retention::spawn_sweeper(liftoff_store, liftoff_engine, liftoff_config);
                    println!("retention sweeper started");
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_shutdown(
            "Room Drain",
            move |_rocket| {
                Box::pin(async move {
                    shutdown_engine.shutdown().await;
                    println!("all rooms closed, terminal flush attempted");
                })
            },
        ))
}
