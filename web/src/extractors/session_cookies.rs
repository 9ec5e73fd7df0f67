use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use axum_extra::extract::CookieJar;
use domain::SessionCookies;
use service::config::Config;
use service::AppState;
use std::convert::Infallible;

/// The caller's session tokens, read from the cookie names configured for this deployment.
pub(crate) struct SessionCookieJar(pub SessionCookies);

impl FromRequestParts<AppState> for SessionCookieJar {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(SessionCookieJar(session_cookies(&parts.headers, &state.config)))
    }
}

pub(crate) fn session_cookies(headers: &HeaderMap, config: &Config) -> SessionCookies {
    let jar = CookieJar::from_headers(headers);
    let value_of = |name: &str| jar.get(name).map(|cookie| cookie.value().to_string());

    SessionCookies {
        access_token: value_of(&config.access_token_cookie),
        refresh_token: value_of(&config.refresh_token_cookie),
    }
}
