use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use tracing_subscriber::prelude::*;

use invitation_api::handlers::{self, InvitationAppState};
use invitation_api::{config, helpers};

#[get("/health")]
async fn health(state: web::Data<InvitationAppState>) -> impl Responder {
    if state.db.is_healthy() {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected"
        }))
    } else {
        HttpResponse::InternalServerError().json(serde_json::json!({
            "status": "unhealthy",
            "database": "disconnected"
        }))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    log_file_path: Option<String>,

    /// Allow frame messages from unlisted origins (logged)
    #[arg(long)]
    dev_mode: bool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(log_path) = args.log_file_path {
        let log_path = std::path::Path::new(&log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("invitation-api.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let db = helpers::database::initialize_database().map_err(std::io::Error::other)?;
    if let Ok(path) = helpers::database::get_db_path() {
        tracing::info!("Database initialized at: {:?}", path);
    }

    let (config, config_path) = config::ApiConfig::load().map_err(std::io::Error::other)?;
    tracing::info!("Loaded config from {:?}", config_path);

    let (host, port) = if let Some(server_config) = &config.server {
        (server_config.host.clone(), server_config.port)
    } else {
        ("127.0.0.1".to_string(), 8080)
    };

    let templates = config.templates();
    let mut channel = config.channel();
    if args.dev_mode {
        channel.dev_mode = true;
    }
    if let Some(cors_config) = &config.cors {
        channel
            .extra_page_origins
            .extend(cors_config.allowed_origins.iter().cloned());
    }
    if channel.admin_token.is_none() {
        tracing::info!("No admin token configured: moderation frame sessions are disabled");
    }
    if channel.dev_mode {
        tracing::warn!("Development mode: messages from unlisted origins will be allowed");
    }
    tracing::info!(
        "Default template {}, {} known template origin(s), delivery schedule {:?} ms",
        templates.default_url,
        templates.known_origins.len(),
        channel.delivery_delays_ms
    );

    let state = InvitationAppState::new(db.async_connection.clone(), templates, channel);
    let sessions = state.sessions.clone();
    let idle = state.channel.session_idle();
    let sweeper = sessions.spawn_sweeper(idle, (idle / 4).max(std::time::Duration::from_secs(1)));

    tracing::info!("Server will listen on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let cors = if let Some(cors_config) = &config.cors {
            let mut cors_builder = Cors::default();
            for origin in &cors_config.allowed_origins {
                cors_builder = cors_builder.allowed_origin(origin);
            }
            cors_builder
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Accept", "Content-Type", handlers::frames::ADMIN_TOKEN_HEADER])
                .max_age(3600)
        } else {
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec!["Accept", "Content-Type", handlers::frames::ADMIN_TOKEN_HEADER])
                .max_age(3600)
        };

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(health)
            .route(
                "/api/invitations/{event_ref}/{guest_ref}",
                web::get().to(handlers::invitations::get_invitation_link),
            )
            .route("/api/frames", web::post().to(handlers::frames::open_frame))
            .route("/api/frames/{id}/load", web::post().to(handlers::frames::frame_loaded))
            .route("/api/frames/{id}/messages", web::post().to(handlers::frames::post_message))
            .route("/api/frames/{id}/outbox", web::get().to(handlers::frames::drain_outbox))
            .route("/api/frames/{id}/reload", web::post().to(handlers::frames::reload_frame))
            .route("/api/frames/{id}", web::delete().to(handlers::frames::close_frame))
            .route(
                "/api/events/{id}/guests/{guest_id}/access",
                web::get().to(handlers::access::get_guest_access),
            )
            .route("/api/events/{id}/access", web::put().to(handlers::access::set_event_access))
    })
    .bind((host.as_str(), port))?
    .run();

    let handle = server.handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        tracing::info!("Ctrl+C received, shutting down...");
        sweeper.abort();
        let closed = sessions.close_all().await;
        tracing::info!("Closed {} open frame session(s)", closed);

        handle.stop(true).await;
    });

    server.await
}
