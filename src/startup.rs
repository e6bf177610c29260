use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpRequest, HttpResponse, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::auth::{AuthService, PasswordHasher, TokenIssuer};
use crate::configuration::Settings;
use crate::error::{set_environment, AppError};
use crate::logger::LoggerMiddleware;
use crate::routes::{self, banner};
use crate::users::UserService;

const MAX_JSON_BODY: usize = 1024 * 1024;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_JSON_BODY)
        .error_handler(|err, _req| AppError::validation(format!("Invalid request body: {}", err)).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::validation(format!("Invalid query string: {}", err)).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::validation(format!("Invalid path parameter: {}", err)).into())
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::not_found(format!(
        "Route {} {} not found",
        req.method(),
        req.path()
    )))
}

/// Build the HTTP server on `listener`.
///
/// The pool is created by the caller and shared with every worker.
pub fn run(listener: TcpListener, pool: PgPool, settings: &Settings) -> Result<Server, std::io::Error> {
    set_environment(settings.application.environment);

    let issuer = TokenIssuer::new(settings.jwt.clone());
    let hasher = PasswordHasher::new(settings.security.bcrypt_cost);
    let auth = web::Data::new(AuthService::new(pool.clone(), issuer.clone(), hasher));
    let users = web::Data::new(UserService::new(pool.clone(), hasher));
    let pool = web::Data::new(pool);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            // Extractor error rendering
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            // Shared state
            .app_data(pool.clone())
            .app_data(auth.clone())
            .app_data(users.clone())
            .route("/", web::get().to(banner))
            .service(web::scope("/api/v1").configure(|cfg| routes::configure(cfg, &issuer)))
            .default_service(web::to(not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
