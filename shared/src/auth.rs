use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;

/// Claims we read from the bearer token. Only the subject matters here.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<usize>,
}

/// The caller's email claim, lowercased. `None` when the token carries none.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerEmail(pub Option<String>);

impl CallerEmail {
    fn from_claim(email: Option<String>) -> Self {
        CallerEmail(
            email
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
        )
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Decodes a token. With `JWT_SECRET` set the HS256 signature and expiry are
/// verified; without it the token is assumed to have been verified by the
/// API Gateway authorizer in front of the Lambda.
pub fn decode_claims(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    match env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()) {
        Some(secret) => {
            let validation = Validation::new(Algorithm::HS256);
            decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            )
            .map(|data| data.claims)
        }
        None => {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.insecure_disable_signature_validation();
            validation.validate_exp = false;
            validation.validate_aud = false;
            validation.required_spec_claims = HashSet::new();
            decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
                .map(|data| data.claims)
        }
    }
}

/// Authenticates the request and stores the caller's user id as an
/// `Extension<String>` and their email as an `Extension<CallerEmail>`.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let token = match bearer_token(&req) {
        Some(token) => token.to_string(),
        None => {
            warn!("Missing bearer token for {} {}", req.method(), req.uri());
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let claims = decode_claims(&token).map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    debug!("Authenticated request for user_id={}", claims.sub);
    req.extensions_mut().insert(CallerEmail::from_claim(claims.email));
    req.extensions_mut().insert(claims.sub);
    Ok(next.run(req).await)
}

/// Builds an unsigned token for the given subject and optional email.
/// Only accepted when `JWT_SECRET` is unset, which is how the test suites run.
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_token(user_id: &str, email: Option<&str>) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let mut claims = serde_json::json!({ "sub": user_id });
    if let Some(email) = email {
        claims["email"] = serde_json::Value::from(email);
    }

    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signature = URL_SAFE_NO_PAD.encode("test-signature");
    format!("{}.{}.{}", header, payload, signature)
}

/// Builds an authenticated JSON request for router tests.
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_request(
    method: &str,
    uri: &str,
    user_id: &str,
    body: Option<serde_json::Value>,
) -> Request {
    build_test_request(method, uri, &create_test_token(user_id, None), body)
}

/// Like [`create_test_request`], with an email claim in the token.
#[cfg(any(test, feature = "test_utils"))]
pub fn create_test_request_with_email(
    method: &str,
    uri: &str,
    user_id: &str,
    email: &str,
    body: Option<serde_json::Value>,
) -> Request {
    build_test_request(method, uri, &create_test_token(user_id, Some(email)), body)
}

#[cfg(any(test, feature = "test_utils"))]
fn build_test_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request {
    use axum::body::Body;

    let builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json");

    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };

    builder.body(body).unwrap()
}
