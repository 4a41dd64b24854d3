use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    web, Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::database::Store;
use crate::models::User;
use crate::services::identity_service;
use crate::services::token_service::TokenVerifier;
use crate::utils::{AppError, AppResult};

/// The reconciled caller, stored in request extensions by [`AuthMiddleware`].
/// Handlers read it with `web::ReqData<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> AppResult<String> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Invalid token format".to_string()))
}

fn verifier_and_store(
    req: &HttpRequest,
) -> AppResult<(web::Data<dyn TokenVerifier>, web::Data<dyn Store>)> {
    let verifier = req
        .app_data::<web::Data<dyn TokenVerifier>>()
        .cloned()
        .ok_or_else(|| AppError::Configuration("token verifier not registered".to_string()))?;
    let store = req
        .app_data::<web::Data<dyn Store>>()
        .cloned()
        .ok_or_else(|| AppError::Configuration("store not registered".to_string()))?;
    Ok((verifier, store))
}

async fn authenticate(req: &HttpRequest) -> AppResult<User> {
    let token = bearer_token(req.headers())?;
    let (verifier, store) = verifier_and_store(req)?;

    let claims = verifier.verify(&token).await?;
    identity_service::reconcile(store.get_ref(), &claims).await
}

/// Identity for public routes that personalise their answer. Anonymous,
/// invalid or unknown callers all resolve to `None`.
pub async fn optional_user(req: &HttpRequest) -> Option<User> {
    let token = bearer_token(req.headers()).ok()?;
    let (verifier, store) = verifier_and_store(req).ok()?;

    let claims = match verifier.verify(&token).await {
        Ok(claims) => claims,
        Err(e) => {
            log::debug!("Ignoring bearer token on public route: {}", e);
            return None;
        }
    };
    store.find_user_by_subject(&claims.sub).await.ok().flatten()
}

/// Rejects requests without a valid bearer token and attaches the
/// reconciled [`CurrentUser`] to the rest.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            match authenticate(req.request()).await {
                Ok(user) => {
                    req.extensions_mut().insert(CurrentUser(user));
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    log::warn!("🔒 {} {} rejected: {}", req.method(), req.path(), err);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AppError::Unauthorized(ref m)) if m == "Missing authorization token"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AppError::Unauthorized(ref m)) if m == "Invalid token format"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
