pub mod jwks;

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
pub use jwks::{JwksCache, KeySource, StaticKeys};

/// Claims this service reads from an access token. Issuer, audience and
/// expiry are checked by `Validation` before these are deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// Caller identity handed to protected handlers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authorization header is expected")]
    MissingHeader,

    #[error("{0}")]
    MalformedHeader(&'static str),

    #[error("Unable to find the appropriate key")]
    UnknownKey,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    Expired,

    #[error("Incorrect claims: {0}")]
    InvalidClaims(String),

    #[error("Permission not granted: {0}")]
    Forbidden(String),

    /// The issuer's key set could not be loaded; not the caller's fault
    #[error("Unable to fetch signing keys: {0}")]
    KeySource(String),
}

impl AuthError {
    /// Machine-readable code returned to clients
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader | AuthError::MalformedHeader(_) | AuthError::UnknownKey => {
                "invalid_header"
            }
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Expired => "token_expired",
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::Forbidden(_) => "unauthorized",
            AuthError::KeySource(_) => "internal_server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::KeySource(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidIssuer => AuthError::InvalidClaims("incorrect issuer".to_string()),
            ErrorKind::InvalidAudience => AuthError::InvalidClaims("incorrect audience".to_string()),
            ErrorKind::ImmatureSignature => AuthError::InvalidClaims("token not yet valid".to_string()),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::InvalidClaims(format!("missing claim '{}'", claim))
            }
            ErrorKind::InvalidAlgorithm => {
                AuthError::MalformedHeader("Unsupported token algorithm")
            }
            _ => AuthError::InvalidToken(err.to_string()),
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("Authorization header is not valid text"))?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        (Some(scheme), None, None) if scheme.eq_ignore_ascii_case("bearer") => {
            Err(AuthError::MalformedHeader("Token not found"))
        }
        (Some(scheme), _, _) if !scheme.eq_ignore_ascii_case("bearer") => Err(
            AuthError::MalformedHeader("Authorization header must start with \"Bearer\""),
        ),
        _ => Err(AuthError::MalformedHeader("Authorization header must be bearer token")),
    }
}

/// Verifies access tokens against the issuer's keys and checks permissions
#[derive(Clone, Debug)]
pub struct Authorizer {
    keys: Arc<dyn KeySource>,
    validation: Validation,
}

impl Authorizer {
    pub fn new(config: &AuthConfig, keys: Arc<dyn KeySource>) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_issuer(&[config.issuer.as_str()]);

        Self { keys, validation }
    }

    /// Check signature, expiry, issuer and audience
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|_| AuthError::MalformedHeader("Unable to parse token header"))?;
        let kid = header
            .kid
            .ok_or(AuthError::MalformedHeader("Token header has no key id"))?;

        let key = self.keys.key(&kid).await?;
        let data = decode::<Claims>(token, &key, &self.validation)?;
        Ok(data.claims)
    }

    /// Full check for a protected route
    pub async fn authorize(&self, headers: &HeaderMap, permission: &str) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.verify(token).await?;

        let permissions = claims
            .permissions
            .ok_or_else(|| AuthError::InvalidClaims("permissions not included in token".to_string()))?;

        if !permissions.iter().any(|granted| granted == permission) {
            return Err(AuthError::Forbidden(permission.to_string()));
        }

        Ok(Principal {
            subject: claims.sub.unwrap_or_else(|| "unknown".to_string()),
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::jwk::JwkSet;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_rsa_private.pem");
    const JWKS: &str = include_str!("../../tests/fixtures/test_jwks.json");
    const KID: &str = "drinks-test-key";

    fn config() -> AuthConfig {
        AuthConfig::for_domain("coffee.test", "drinks").unwrap()
    }

    fn authorizer() -> Authorizer {
        let set: JwkSet = serde_json::from_str(JWKS).unwrap();
        Authorizer::new(&config(), Arc::new(StaticKeys::new(&set)))
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn claims(permissions: &[&str]) -> Value {
        json!({
            "iss": "https://coffee.test/",
            "aud": "drinks",
            "sub": "auth0|barista",
            "iat": now(),
            "exp": now() + 3600,
            "permissions": permissions,
        })
    }

    fn sign(claims: &Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bearer(token: &str) -> HeaderMap {
        headers(&format!("Bearer {}", token))
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert!(matches!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingHeader)));
        assert!(matches!(
            bearer_token(&headers("Basic abc")),
            Err(AuthError::MalformedHeader(_))
        ));
        assert!(matches!(bearer_token(&headers("Bearer")), Err(AuthError::MalformedHeader(_))));
        assert!(matches!(
            bearer_token(&headers("Bearer a b")),
            Err(AuthError::MalformedHeader(_))
        ));
    }

    #[tokio::test]
    async fn grants_matching_permission() {
        let token = sign(&claims(&["get:drinks-detail", "post:drinks"]), Some(KID));
        let principal = authorizer().authorize(&bearer(&token), "post:drinks").await.unwrap();
        assert_eq!(principal.subject, "auth0|barista");
        assert_eq!(principal.permissions.len(), 2);
    }

    #[tokio::test]
    async fn missing_permission_is_forbidden() {
        let token = sign(&claims(&["get:drinks-detail"]), Some(KID));
        let err = authorizer().authorize(&bearer(&token), "delete:drinks").await.unwrap_err();
        assert_eq!(err.code(), "unauthorized");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut expired = claims(&["post:drinks"]);
        expired["iat"] = json!(now() - 7200);
        expired["exp"] = json!(now() - 3600);
        let token = sign(&expired, Some(KID));

        let err = authorizer().authorize(&bearer(&token), "post:drinks").await.unwrap_err();
        assert_eq!(err.code(), "token_expired");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn token_expired_seconds_ago_is_rejected() {
        let mut expired = claims(&["post:drinks"]);
        expired["iat"] = json!(now() - 600);
        expired["exp"] = json!(now() - 5);
        let token = sign(&expired, Some(KID));

        let err = authorizer().authorize(&bearer(&token), "post:drinks").await.unwrap_err();
        assert_eq!(err.code(), "token_expired");
    }

    #[tokio::test]
    async fn wrong_audience_and_issuer_are_invalid_claims() {
        let mut foreign = claims(&["post:drinks"]);
        foreign["aud"] = json!("someone-else");
        let err = authorizer()
            .authorize(&bearer(&sign(&foreign, Some(KID))), "post:drinks")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_claims");

        let mut foreign = claims(&["post:drinks"]);
        foreign["iss"] = json!("https://evil.test/");
        let err = authorizer()
            .authorize(&bearer(&sign(&foreign, Some(KID))), "post:drinks")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_claims");
    }

    #[tokio::test]
    async fn token_without_permissions_claim_is_invalid_claims() {
        let mut bare = claims(&[]);
        bare.as_object_mut().unwrap().remove("permissions");
        let err = authorizer()
            .authorize(&bearer(&sign(&bare, Some(KID))), "post:drinks")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_claims");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn key_id_is_required_and_must_be_known() {
        let token = sign(&claims(&["post:drinks"]), None);
        let err = authorizer().authorize(&bearer(&token), "post:drinks").await.unwrap_err();
        assert_eq!(err.code(), "invalid_header");

        let token = sign(&claims(&["post:drinks"]), Some("rotated-away"));
        let err = authorizer().authorize(&bearer(&token), "post:drinks").await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey));
    }

    #[tokio::test]
    async fn tampered_token_is_invalid() {
        let token = sign(&claims(&["post:drinks"]), Some(KID));
        let forged = sign(&claims(&["post:drinks", "delete:drinks"]), Some(KID));

        // Payload from one token, signature from another
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();
        let tampered = parts.join(".");

        let err = authorizer().authorize(&bearer(&tampered), "delete:drinks").await.unwrap_err();
        assert_eq!(err.code(), "invalid_token");
    }

    #[tokio::test]
    async fn garbage_token_is_invalid_header() {
        let err = authorizer().authorize(&bearer("not-a-jwt"), "post:drinks").await.unwrap_err();
        assert_eq!(err.code(), "invalid_header");
    }
}
