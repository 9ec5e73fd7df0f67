use crate::extractors::session_cookies::session_cookies;
use crate::Error;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::{error::Error as DomainError, BackendClient, CredentialProvider, SessionCookieCredentials};
use log::*;
use service::AppState;

/// The `Authorization` value to present to the backend on the caller's behalf.
///
/// Rejects with `401 {"message":"Unauthenticated"}` when neither the access
/// token nor a refresh yields a usable credential.
pub(crate) struct AuthorizedCaller(pub String);

impl FromRequestParts<AppState> for AuthorizedCaller {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookies = session_cookies(&parts.headers, &state.config);
        let credentials = SessionCookieCredentials::new(BackendClient::new(
            &state.config,
            state.http_client.clone(),
        ));

        match credentials.authorization(&cookies).await {
            Some(authorization) => Ok(AuthorizedCaller(authorization)),
            None => {
                debug!("Rejecting request without a usable session");
                Err(DomainError::unauthenticated().into())
            }
        }
    }
}
