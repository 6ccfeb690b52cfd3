mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod utils;

use actix_web::{web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use log::info;
use serde_json::json;

use crate::config::AppConfig;

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Cloud Notes API — OK" }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    // Startup is refused on incomplete configuration; in particular there is
    // no fallback signing secret.
    let app_config = AppConfig::from_env().expect("Invalid configuration");

    let pool = db::create_pool(&app_config)
        .await
        .expect("Failed to connect to the database");
    db::init_schema(&pool)
        .await
        .expect("Failed to initialize the database schema");

    let s3_client = utils::s3::create_s3_client(&app_config).await;

    info!("Starting server at {}", app_config.bind_addr);

    let bind_addr = app_config.bind_addr.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(s3_client.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .service(web::resource("/").route(web::get().to(root)))
            .service(
                web::resource("/users/register")
                    .route(web::post().to(handlers::users::register)),
            )
            .service(
                web::resource("/users/login")
                    .route(web::post().to(handlers::users::login)),
            )
            .service(
                web::resource("/notes/upload")
                    .route(web::post().to(handlers::notes::upload_note)),
            )
            .service(
                web::resource("/notes/")
                    .route(web::post().to(handlers::notes::create_note))
                    .route(web::get().to(handlers::notes::list_notes)),
            )
            .service(
                web::resource("/notes/{note_id}")
                    .route(web::get().to(handlers::notes::get_note))
                    .route(web::delete().to(handlers::notes::delete_note)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
