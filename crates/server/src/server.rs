use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
    typed_header::TypedHeaderRejection,
};

use std::{net::SocketAddr, sync::Arc};

use crate::{
    ServerError, accounts,
    api_key::{ApiSecret, require_api_key},
    auth_check, plans, profile,
    request::propagate_request_id,
};
use engine::{Engine, users};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub api_secret: ApiSecret,
}

impl ServerState {
    pub fn new(engine: Engine, api_secret: ApiSecret) -> Self {
        Self {
            engine: Arc::new(engine),
            api_secret,
        }
    }
}

/// Where to listen and the secret the block server authenticates with.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub api_secret: String,
}

/// `TypedHeader` for token authentication
///
/// Clients send `Authorization: Token <key>`.
#[derive(Debug)]
pub(crate) struct TokenAuthorization(pub String);

impl TokenAuthorization {
    /// Splits `Token <key>`; anything but exactly these two words is refused.
    pub(crate) fn parse(value: &str) -> Option<Self> {
        let mut words = value.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("Token"), Some(key), None) => Some(Self(key.to_string())),
            _ => None,
        }
    }
}

impl Header for TokenAuthorization {
    fn name() -> &'static axum::http::HeaderName {
        &axum::http::header::AUTHORIZATION
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };

        TokenAuthorization::parse(value).ok_or_else(AxumError::invalid)
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        let as_string = format!("Token {}", self.0);
        match axum::http::HeaderValue::from_str(&as_string) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode authorization header"),
        }
    }
}

/// Resolves the token owner and stores it in the request extensions.
async fn token_auth(
    auth_header: Result<TypedHeader<TokenAuthorization>, TypedHeaderRejection>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let TypedHeader(TokenAuthorization(key)) = auth_header.map_err(|rejection| {
        if rejection.is_missing() {
            ServerError::Unauthorized("Authentication credentials were not provided.".to_string())
        } else {
            ServerError::Unauthorized("Invalid token header.".to_string())
        }
    })?;

    let user: users::Model = match state.engine.user_by_token(&key).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ServerError::Unauthorized("Invalid token.".to_string())),
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let service = Router::new()
        .route("/api/v0/auth/", post(auth_check::check))
        .route(
            "/api/v0/auth/{prefix}/{*file_path}",
            post(auth_check::check_resource),
        )
        .route("/api/v0/plan/subscription/", post(plans::subscription))
        .route("/api/v0/plan/add-interval/", post(plans::add_interval))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let authenticated = Router::new()
        .route("/api/v0/auth/logout/", post(accounts::logout))
        .route("/api/v0/auth/user/", get(accounts::user_details))
        .route(
            "/api/v0/auth/password/change/",
            post(accounts::password_change),
        )
        .route("/api/v0/profile/", get(profile::get))
        .route_layer(middleware::from_fn_with_state(state.clone(), token_auth));

    Router::new()
        .route("/api/v0/", get(accounts::api_root))
        .route("/api/v0/auth/registration/", post(accounts::register))
        .route(
            "/api/v0/auth/registration/verify-email/",
            post(accounts::verify_email),
        )
        .route("/api/v0/auth/login/", post(accounts::login))
        .merge(service)
        .merge(authenticated)
        .layer(middleware::from_fn(propagate_request_id))
        .with_state(state)
}

pub async fn run(engine: Engine, config: ServerConfig) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind((config.bind.as_str(), config.port)).await?;
    run_with_listener(engine, ApiSecret::new(&config.api_secret), listener).await
}

pub async fn run_with_listener(
    engine: Engine,
    api_secret: ApiSecret,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState::new(engine, api_secret);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

pub fn spawn_with_listener(
    engine: Engine,
    api_secret: ApiSecret,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, api_secret, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
