use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::middleware::{DefaultHeaders, ErrorHandlers, Logger};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use bgculture::app_config;
use bgculture::db::init_db;
use bgculture::middleware::ClientCtx;
use bgculture::storage::{self, StorageBackend};
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_lib_mods();
    init_our_mods();
    init_db(std::env::var("DATABASE_URL").expect("DATABASE_URL must be set.")).await;

    let storage: Data<dyn StorageBackend> = match storage::from_config(&app_config::storage()) {
        Ok(backend) => Data::from(backend),
        Err(err) => panic!("Storage backend failed to initialize: {}", err),
    };

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) if key.len() >= 64 => Key::from(key.as_bytes()),
        other => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid ({:?}). Session cookies will not survive a restart. A secret key must be at least 64 bytes.\r\n\r\nNeed a key? How about:\r\n{}", other.map(|k| k.len()), random_string);
            Key::from(random_string.as_bytes())
        }
    };

    let server = app_config::server();
    let static_dir = server.static_dir;
    log::info!("Listening on {}", server.bind_address);

    HttpServer::new(move || {
        // Middleware runs in reverse registration order.
        App::new()
            .app_data(storage.clone())
            .wrap(
                DefaultHeaders::new()
                    .add((header::X_FRAME_OPTIONS, "DENY"))
                    .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .wrap(
                ErrorHandlers::new()
                    .handler(StatusCode::BAD_REQUEST, bgculture::web::error::render_400)
                    .handler(StatusCode::NOT_FOUND, bgculture::web::error::render_404)
                    .handler(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        bgculture::web::error::render_500,
                    ),
            )
            .wrap(ClientCtx::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    .cookie_secure(false)
                    .session_lifecycle(PersistentSession::default())
                    .build(),
            )
            .wrap(Logger::new("%a %r %s %Dms"))
            .service(actix_files::Files::new("/static", static_dir.clone()))
            .configure(bgculture::web::configure)
    })
    .bind(server.bind_address.as_str())?
    .run()
    .await
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is fine in production.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Initialize all local mods.
pub fn init_our_mods() {
    app_config::init();
}
