use actix_service::{forward_ready, Service};
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures::future::{ok, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::rc::Rc;

use crate::error::ApiError;
use crate::models::Claims;

pub const ADMIN_ROLE: &str = "admin";
pub const TOKEN_COOKIE: &str = "token";

/// Lets a request through only when it carries a valid admin token.
///
/// The token comes from `Authorization: Bearer <jwt>` or, failing that, the
/// `token` cookie. On success the caller's id (`sub`) is stored in the request
/// extensions.
pub struct AdminMiddleware {
    secret: Rc<String>,
}

impl AdminMiddleware {
    pub fn new(secret: impl Into<String>) -> Self {
        AdminMiddleware {
            secret: Rc::new(secret.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AdminMiddlewareService<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminMiddlewareService {
            service: Rc::new(service),
            secret: self.secret.clone(),
        })
    }
}

pub struct AdminMiddlewareService<S> {
    service: Rc<S>,
    secret: Rc<String>,
}

fn bearer_token(req: &ServiceRequest) -> Result<Option<String>, ApiError> {
    let Some(header) = req.headers().get("Authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid authorization header".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) => Ok(Some(token.trim().to_string())),
        None => Err(ApiError::Unauthorized("Invalid authorization scheme".to_string())),
    }
}

fn admin_claims(req: &ServiceRequest, secret: &str) -> Result<Claims, ApiError> {
    let token = match bearer_token(req)? {
        Some(token) => token,
        None => req
            .cookie(TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::Unauthorized("Authorization token missing".to_string()))?,
    };

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?
    .claims;

    if claims.role.as_deref() != Some(ADMIN_ROLE) {
        log::warn!("Non-admin user {} attempted an admin action", claims.sub);
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(claims)
}

impl<S, B> Service<ServiceRequest> for AdminMiddlewareService<S>
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
        let secret = self.secret.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let claims = admin_claims(&req, &secret)?;
            req.extensions_mut().insert(claims.sub);
            service.call(req).await
        })
    }
}
