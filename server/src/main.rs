use actix_web::{middleware, App, HttpServer};
use clap::Parser;
use log::info;
use todo_server::config::ServerConfig;
use todo_server::{cors, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = ServerConfig::parse();
    let state = AppState::from_config(&config).map_err(std::io::Error::other)?;
    let origins = config.cors_origins();

    info!(
        "todo-server {} listening on http://{}:{} (database: {})",
        todo_server::VERSION,
        config.bind,
        config.port,
        config.database.display()
    );
    if !state.policy.protect_tasks {
        info!("task endpoints are public");
    }

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::NormalizePath::trim())
            .wrap(cors(&origins))
            .wrap(middleware::Logger::default())
            .configure(|cfg| state.configure(cfg))
    })
    .bind((config.bind.as_str(), config.port))?
    .run()
    .await
}
