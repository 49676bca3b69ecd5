// src/auth.rs
use crate::web::ServerState;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use tracing::warn;

/// Ledger key used when the caller's address is unknown.
pub const FALLBACK_IDENTITY: &str = "local_user";

/// Who the credit ledger charges: the caller's socket address.
///
/// The `X-Real-IP` header is only honoured when `trust_proxy_header` is set,
/// since any direct caller can forge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIdentity {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let trust_proxy = match req.guard::<&State<ServerState>>().await {
            Outcome::Success(state) => state.config.environment.trust_proxy_header,
            _ => false,
        };

        let ip = if trust_proxy {
            req.client_ip()
        } else {
            req.remote().map(|addr| addr.ip())
        };

        let identity = ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| FALLBACK_IDENTITY.to_string());
        Outcome::Success(ClientIdentity(identity))
    }
}

/// Bearer-token guard for the credit admin endpoints.
pub struct AdminAuth;

#[derive(Debug)]
pub enum AuthError {
    AdminDisabled,
    MissingToken,
    InvalidToken,
    StateUnavailable,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::AdminDisabled => "Admin access is not configured on this server",
            AuthError::MissingToken => "Authorization token required",
            AuthError::InvalidToken => "Invalid admin token",
            AuthError::StateUnavailable => "Server state unavailable",
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminAuth {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let state = match req.guard::<&State<ServerState>>().await {
            Outcome::Success(state) => state,
            Outcome::Error((status, _)) => return Outcome::Error((status, AuthError::StateUnavailable)),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let verdict = match state.config.secrets.admin_token.as_deref() {
            None => Err((Status::Forbidden, AuthError::AdminDisabled)),
            Some(expected) => match req.headers().get_one("Authorization") {
                None => Err((Status::Unauthorized, AuthError::MissingToken)),
                Some(header) => match header.strip_prefix("Bearer ") {
                    Some(token) if token == expected => Ok(AdminAuth),
                    _ => Err((Status::Unauthorized, AuthError::InvalidToken)),
                },
            },
        };

        match verdict {
            Ok(admin) => Outcome::Success(admin),
            Err((status, reason)) => {
                warn!(path = %req.uri(), "Rejected admin request: {}", reason.message());
                Outcome::Error((status, reason))
            }
        }
    }
}
