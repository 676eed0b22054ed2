#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use drinks_api::auth::{Authorizer, JwksCache};
use drinks_api::config::{AuthConfig, SecurityConfig};
use drinks_api::database::models::{Drink, Ingredient, NewDrink, Recipe};
use drinks_api::database::{DrinkStore, MemoryDrinkStore};
use drinks_api::server::{app, AppState};

const PRIVATE_KEY: &str = include_str!("../fixtures/test_rsa_private.pem");
const JWKS: &str = include_str!("../fixtures/test_jwks.json");

pub const KID: &str = "drinks-test-key";
pub const AUDIENCE: &str = "drinks";

/// Every permission the catalog knows about
pub const BARISTA: &[&str] = &[
    "get:drinks-detail",
    "post:drinks",
    "patch:drinks",
    "delete:drinks",
];

/// Drinks API on a local port, backed by the memory store, trusting a local
/// JWKS endpoint that serves the fixture key
pub struct TestServer {
    pub base_url: String,
    pub issuer: String,
    pub store: Arc<MemoryDrinkStore>,
    pub client: reqwest::Client,
}

async fn bind_local() -> Result<TcpListener> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind 127.0.0.1:{}", port))
}

async fn spawn_jwks() -> Result<String> {
    let jwks: Value = serde_json::from_str(JWKS)?;
    let router = Router::new().route(
        "/.well-known/jwks.json",
        get(move || {
            let jwks = jwks.clone();
            async move { Json(jwks) }
        }),
    );

    let listener = bind_local().await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let jwks_base = spawn_jwks().await?;
        let auth = AuthConfig::for_domain(&jwks_base, AUDIENCE)?;
        let issuer = auth.issuer.to_string();

        let keys = JwksCache::new(auth.jwks_url.clone(), Duration::from_secs(60));
        let authorizer = Authorizer::new(&auth, Arc::new(keys));

        let store = Arc::new(MemoryDrinkStore::new());
        let state = AppState::new(store.clone(), Arc::new(authorizer));
        let router = app(state, &SecurityConfig { cors_origins: Vec::new() });

        let listener = bind_local().await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            issuer,
            store,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn claims(&self, permissions: &[&str]) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": self.issuer,
            "aud": AUDIENCE,
            "sub": "auth0|integration",
            "iat": now,
            "exp": now + 3600,
            "permissions": permissions,
        })
    }

    /// Valid token carrying exactly `permissions`
    pub fn token(&self, permissions: &[&str]) -> String {
        sign(&self.claims(permissions), KID)
    }

    pub fn expired_token(&self, permissions: &[&str]) -> String {
        let now = chrono::Utc::now().timestamp();
        let mut claims = self.claims(permissions);
        claims["iat"] = json!(now - 7200);
        claims["exp"] = json!(now - 3600);
        sign(&claims, KID)
    }

    pub async fn seed(&self, title: &str) -> Result<Drink> {
        let drink = self.store.create(recipe_drink(title)).await?;
        Ok(drink)
    }
}

pub fn sign(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).expect("fixture key is valid PEM");
    encode(&header, claims, &key).expect("fixture key signs")
}

pub fn recipe_drink(title: &str) -> NewDrink {
    NewDrink {
        title: title.to_string(),
        recipe: Recipe(vec![
            Ingredient {
                name: "espresso".to_string(),
                color: "brown".to_string(),
                parts: 1,
            },
            Ingredient {
                name: "milk".to_string(),
                color: "white".to_string(),
                parts: 3,
            },
        ]),
    }
}
