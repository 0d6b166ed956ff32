//! Login Flow v2: obtain an app password from a server interactively.
//!
//! Both endpoints are anonymous, so these run before an [`crate::Account`]
//! exists and take the HTTP client directly.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::DavError;

/// Response of `POST /index.php/login/v2`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginFlow {
    pub poll: LoginFlowPoll,
    /// URL the user must open in a browser to authorize the client.
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginFlowPoll {
    pub token: String,
    pub endpoint: String,
}

/// Result of a successful poll: the credentials to store as an account.
#[derive(Debug, Clone, Deserialize)]
pub struct AppPassword {
    pub server: String,
    #[serde(rename = "loginName")]
    pub login_name: String,
    #[serde(rename = "appPassword")]
    pub app_password: String,
}

/// Starts a login flow against `{server_url}/index.php/login/v2`.
pub async fn login_flow_v2(
    http: &reqwest::Client,
    server_url: &str,
) -> Result<LoginFlow, DavError> {
    let raw = format!("{}/index.php/login/v2", server_url.trim_end_matches('/'));
    let url = Url::parse(&raw).map_err(|e| DavError::MalformedUrl(format!("{}: {}", raw, e)))?;
    debug!("starting login flow v2 at {}", url);

    let response = http.post(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DavError::HttpStatus {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| DavError::bad_response(format!("undecodable login flow payload: {}", e)))
}

/// Polls the flow endpoint. Returns the app password once the user has
/// authorized; until then the server answers 404 and that surfaces as an
/// `HttpStatus` error the caller is expected to retry on its own schedule.
pub async fn login_flow_v2_poll(
    http: &reqwest::Client,
    token: &str,
    endpoint: &str,
) -> Result<AppPassword, DavError> {
    let url =
        Url::parse(endpoint).map_err(|e| DavError::MalformedUrl(format!("{}: {}", endpoint, e)))?;
    debug!("polling login flow v2 at {}", url);

    let response = http.post(url).form(&[("token", token)]).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DavError::HttpStatus {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| DavError::bad_response(format!("undecodable app password payload: {}", e)))
}
