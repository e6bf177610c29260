/// Access Control Middleware
///
/// Each protected resource declares the roles it admits with a `RoleSet`.
/// The middleware verifies the bearer token, checks the role and injects
/// the caller's `Identity` into request extensions for handlers to extract
/// with `web::ReqData<Identity>`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderValue, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{Identity, TokenIssuer};
use crate::domain::RoleSet;
use crate::error::AppError;

const BEARER_PREFIX: &str = "Bearer ";

/// Verify an `Authorization` header and check the caller's role.
///
/// # Errors
/// - 401 when the header is missing, not a bearer token, or the token does
///   not verify
/// - 403 when the token is valid but its role is not in `required`
pub fn authorize(
    header: Option<&HeaderValue>,
    issuer: &TokenIssuer,
    required: RoleSet,
) -> Result<Identity, AppError> {
    let token = header
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Missing or invalid authorization header"))?;

    let claims = issuer.verify_access(token)?;
    let identity = Identity::try_from(&claims)?;

    if !required.allows(identity.role) {
        tracing::warn!(
            user_id = identity.user_id,
            role = %identity.role,
            "Role not permitted on this route"
        );
        return Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ));
    }

    Ok(identity)
}

/// Per-resource role requirement
pub struct AccessControl {
    issuer: TokenIssuer,
    required: RoleSet,
}

impl AccessControl {
    pub fn new(issuer: TokenIssuer, required: RoleSet) -> Self {
        Self { issuer, required }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessControl
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessControlService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessControlService {
            service: Rc::new(service),
            issuer: self.issuer.clone(),
            required: self.required,
        }))
    }
}

pub struct AccessControlService<S> {
    service: Rc<S>,
    issuer: TokenIssuer,
    required: RoleSet,
}

impl<S, B> Service<ServiceRequest> for AccessControlService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authorize(req.headers().get(AUTHORIZATION), &self.issuer, self.required) {
            Ok(identity) => {
                tracing::debug!(
                    user_id = identity.user_id,
                    store_id = ?identity.store_id,
                    "Access granted"
                );
                req.extensions_mut().insert(identity);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(err) => Box::pin(async move { Err(err.into()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::domain::Role;
    use actix_web::{http::StatusCode, test as actix_test, web, App, HttpResponse};

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            reset_token_expiry: 3600,
            issuer: "test".to_string(),
        })
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let err = authorize(None, &issuer(), RoleSet::ANY).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_wrong_scheme_is_unauthorized() {
        let issuer = issuer();
        let token = issuer.issue_access(1, Role::Admin, Some(1)).unwrap().token;
        let header = HeaderValue::from_str(&format!("Basic {}", token)).unwrap();

        let err = authorize(Some(&header), &issuer, RoleSet::ANY).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_refresh_token_is_not_accepted() {
        let issuer = issuer();
        let token = issuer.issue_refresh(1, Role::Admin, Some(1)).unwrap().token;

        let err = authorize(Some(&bearer(&token)), &issuer, RoleSet::ANY).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_recently_expired_token_is_unauthorized() {
        let issuer = TokenIssuer::new(JwtSettings {
            access_token_expiry: -5,
            ..issuer().settings().clone()
        });
        let token = issuer.issue_access(1, Role::Admin, Some(1)).unwrap().token;

        let err = authorize(Some(&bearer(&token)), &issuer, RoleSet::ANY).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Token has expired");
    }

    #[test]
    fn test_role_outside_set_is_forbidden() {
        let issuer = issuer();
        let token = issuer.issue_access(2, Role::Cashier, Some(1)).unwrap().token;

        let err = authorize(Some(&bearer(&token)), &issuer, RoleSet::ADMIN).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_allowed_role_yields_identity() {
        let issuer = issuer();
        let token = issuer.issue_access(2, Role::Cashier, Some(4)).unwrap().token;
        let required = RoleSet::of(&[Role::Admin, Role::Cashier]);

        let identity = authorize(Some(&bearer(&token)), &issuer, required).unwrap();
        assert_eq!(
            identity,
            Identity {
                user_id: 2,
                role: Role::Cashier,
                store_id: Some(4),
            }
        );
    }

    async fn whoami(identity: web::ReqData<Identity>) -> HttpResponse {
        HttpResponse::Ok().body(identity.user_id.to_string())
    }

    #[actix_web::test]
    async fn test_middleware_injects_identity() {
        let issuer = issuer();
        let token = issuer.issue_access(9, Role::Admin, Some(1)).unwrap().token;
        let app = actix_test::init_service(
            App::new().service(
                web::resource("/admin")
                    .wrap(AccessControl::new(issuer.clone(), RoleSet::ADMIN))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, web::Bytes::from_static(b"9"));
    }

    #[actix_web::test]
    async fn test_middleware_rejects_without_token() {
        let app = actix_test::init_service(
            App::new().service(
                web::resource("/admin")
                    .wrap(AccessControl::new(issuer(), RoleSet::ADMIN))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/admin").to_request();
        let resp = actix_test::try_call_service(&app, req).await;

        let err = resp.err().expect("request should be rejected");
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
