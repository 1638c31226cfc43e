//! OAuth2 client-credentials token acquisition for the ARM API.
//!
//! The demo authenticates as a service principal: a single POST to the
//! tenant's token endpoint exchanges the client id/secret for a bearer token
//! scoped to the management endpoint. Tokens are fetched once per run; a
//! provisioning run comfortably fits inside the token lifetime.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ArmCredentials;
use crate::provider::ProviderError;

/// OAuth2 token response from the Microsoft identity platform.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Bearer token for the requested scope
    access_token: String,
    /// Token lifetime in seconds
    #[serde(default)]
    #[allow(dead_code)] // Part of the response shape; unused after parsing
    expires_in: Option<u64>,
}

/// Exchange service-principal credentials for an ARM access token.
pub(super) async fn fetch_access_token(
    http: &Client,
    authority_host: &str,
    credentials: &ArmCredentials,
    scope: &str,
) -> Result<String, ProviderError> {
    let token_url = format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        credentials.tenant_id
    );
    debug!("Requesting ARM access token from {}", token_url);

    let response = http
        .post(&token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("scope", scope),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Auth(format!(
            "token endpoint returned HTTP {}: {}",
            status.as_u16(),
            body
        )));
    }

    let token: TokenResponse = response.json().await?;
    info!("Acquired ARM access token");
    Ok(token.access_token)
}
