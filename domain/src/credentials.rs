use crate::gateway::backend::BackendClient;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use log::*;
use serde::Deserialize;

/// Tokens close enough to expiry are refreshed instead of forwarded.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 30;

/// Session tokens carried by the caller's cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Produces the `Authorization` header value used to call the backend on behalf of a caller.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// `Some("Bearer <token>")`, or `None` when no valid session can be established.
    async fn authorization(&self, cookies: &SessionCookies) -> Option<String>;
}

/// Cookie-backed credentials that transparently refresh an expired access token.
///
/// The refreshed token is used for the current request only; it is not
/// written back to the browser.
pub struct SessionCookieCredentials {
    backend: BackendClient,
}

impl SessionCookieCredentials {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    async fn refresh(&self, refresh_token: &str) -> Option<String> {
        match self.backend.refresh_session(refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to refresh session: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for SessionCookieCredentials {
    async fn authorization(&self, cookies: &SessionCookies) -> Option<String> {
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = cookies.access_token.as_deref().filter(|t| !t.is_empty()) {
            if !is_expired(token, now) {
                return Some(bearer(token));
            }
            debug!("Access token expired, attempting refresh");
        }

        let refresh_token = cookies.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        self.refresh(refresh_token).await.map(|token| bearer(&token))
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Whether `token` is a JWT whose `exp` falls within the skew window of `now`.
/// Opaque tokens, and JWTs without `exp`, are left for the backend to judge.
pub fn is_expired(token: &str, now: i64) -> bool {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(decoded) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
        return false;
    };

    match serde_json::from_slice::<ExpiryClaim>(&decoded) {
        Ok(ExpiryClaim { exp: Some(exp) }) => exp <= now + TOKEN_EXPIRY_SKEW_SECS,
        _ => false,
    }
}
