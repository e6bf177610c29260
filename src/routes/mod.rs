mod auth;
mod health_check;
mod users;

use actix_web::{guard, web};

use crate::auth::TokenIssuer;
use crate::domain::RoleSet;
use crate::middleware::AccessControl;

pub use health_check::{banner, health_check};

/// Mount every `/api/v1` route.
///
/// Protected resources carry their own `AccessControl`; the same path may
/// appear twice when its methods need different roles.
pub fn configure(cfg: &mut web::ServiceConfig, issuer: &TokenIssuer) {
    let any = || AccessControl::new(issuer.clone(), RoleSet::ANY);
    let admin = || AccessControl::new(issuer.clone(), RoleSet::ADMIN);

    cfg.route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/refresh-token", web::post().to(auth::refresh_token))
                .route("/forgot-password", web::post().to(auth::forgot_password))
                .route("/reset-password", web::post().to(auth::reset_password))
                .service(
                    web::resource("/logout")
                        .wrap(any())
                        .route(web::post().to(auth::logout)),
                )
                .service(web::resource("/me").wrap(any()).route(web::get().to(auth::me))),
        )
        .service(
            web::scope("/users")
                .service(
                    web::resource("")
                        .wrap(admin())
                        .route(web::get().to(users::list_users))
                        .route(web::post().to(users::create_user)),
                )
                // Before "/{id}", which would otherwise capture it
                .service(
                    web::resource("/profile")
                        .wrap(any())
                        .route(web::get().to(users::get_profile))
                        .route(web::put().to(users::update_profile)),
                )
                .service(
                    web::resource("/{id}/change-password")
                        .wrap(any())
                        .route(web::patch().to(users::change_password)),
                )
                .service(
                    web::resource("/{id}")
                        .guard(guard::Delete())
                        .wrap(admin())
                        .route(web::delete().to(users::delete_user)),
                )
                .service(
                    web::resource("/{id}")
                        .wrap(any())
                        .route(web::get().to(users::get_user))
                        .route(web::put().to(users::update_user)),
                ),
        );
}
