//! OAuth token flows.
//!
//! [`OAuth2Client`] builds the user authorization URL and performs the
//! token exchanges: authorization code → short-lived token, short-lived →
//! long-lived token, and long-lived token → client code. All exchanges go
//! to the authorization host rather than the Graph host. Obtain one via
//! [`Client::oauth`](crate::client::Client::oauth).
//!
//! # Example
//!
//! ```rust,no_run
//! # use instagram_graph_rs::Client;
//! # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let oauth = client.oauth();
//! let login_url = oauth.authorization_url(
//!     "https://example.com/callback",
//!     "csrf-state-value",
//!     &["user_profile", "user_media"],
//!     [("display", "page")],
//! )?;
//!
//! // ...user authorizes and comes back with ?code=...
//! let token = oauth
//!     .get_access_token_from_code("the-code", "https://example.com/callback")
//!     .await?;
//! println!("token: {}", token.value());
//! # Ok(()) }
//! ```

use std::collections::BTreeMap;

use crate::auth::AccessToken;
use crate::client::Client;
use crate::error::Error;
use crate::request::{append_params_to_url, GraphRequest};
use crate::response::GraphResponse;

/// Client for the OAuth authorization and token-exchange endpoints.
///
/// Every exchange is a `POST` carrying `{client_id, client_secret}`,
/// authenticated with the app access token unless the flow supplies its
/// own, so the [`Client`] must have an app configured. The endpoints live
/// directly under the authorization host, with no Graph version prefix.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    client: Client,
}

impl OAuth2Client {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the URL to send a user to for authorization.
    ///
    /// `scopes` are comma-joined into a single `scope` parameter, and
    /// `extra_params` win over the generated parameters on key collision.
    pub fn authorization_url<K, V>(
        &self,
        redirect_url: &str,
        state: &str,
        scopes: &[&str],
        extra_params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, Error>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let app = self.client.require_app()?;

        let mut params = BTreeMap::new();
        params.insert("client_id".to_owned(), app.id().to_owned());
        params.insert("state".to_owned(), state.to_owned());
        params.insert("response_type".to_owned(), "code".to_owned());
        params.insert("redirect_uri".to_owned(), redirect_url.to_owned());
        params.insert("scope".to_owned(), scopes.join(","));
        for (key, value) in extra_params {
            params.insert(key.into(), value.into());
        }

        let base = format!("{}/oauth/authorize", self.client.authorization_base_url());
        Ok(append_params_to_url(&base, &params))
    }

    /// Exchanges an authorization code for a short-lived access token.
    ///
    /// Fails with [`Error::TokenExchange`] when the reply lacks an
    /// `access_token`.
    pub async fn get_access_token_from_code(
        &self,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<AccessToken, Error> {
        let mut params = BTreeMap::new();
        params.insert("code".to_owned(), code.into());
        params.insert("redirect_uri".to_owned(), redirect_uri.into());
        params.insert("grant_type".to_owned(), "authorization_code".to_owned());

        self.request_access_token(params).await
    }

    /// Exchanges a short-lived access token for a long-lived one.
    pub async fn get_long_lived_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<AccessToken, Error> {
        let mut params = BTreeMap::new();
        params.insert("grant_type".to_owned(), "fb_exchange_token".to_owned());
        params.insert("fb_exchange_token".to_owned(), token.value().to_owned());

        self.request_access_token(params).await
    }

    /// Trades a long-lived token for a one-time client code, used to mint
    /// tokens on another surface without shipping the token itself.
    ///
    /// Fails with [`Error::TokenExchange`] when the reply lacks a `code`.
    pub async fn get_code_from_long_lived_access_token(
        &self,
        token: &AccessToken,
        redirect_uri: impl Into<String>,
    ) -> Result<String, Error> {
        let mut params = BTreeMap::new();
        params.insert("redirect_uri".to_owned(), redirect_uri.into());

        let response = self
            .send_with_client_params("/oauth/client_code", params, Some(token))
            .await?;
        response
            .str_field("code")
            .map(str::to_owned)
            .ok_or(Error::TokenExchange { missing: "code" })
    }

    async fn request_access_token(
        &self,
        params: BTreeMap<String, String>,
    ) -> Result<AccessToken, Error> {
        let response = self
            .send_with_client_params("/oauth/access_token", params, None)
            .await?;

        let value = response
            .str_field("access_token")
            .ok_or(Error::TokenExchange {
                missing: "access_token",
            })?
            .to_owned();

        // The same endpoint names the expiry `expires` when upgrading a
        // token and `expires_in` when exchanging a code.
        let ttl = response
            .int_field("expires")
            .or_else(|| response.int_field("expires_in"))
            .and_then(|seconds| u64::try_from(seconds).ok())
            .unwrap_or(0);

        Ok(AccessToken::from_ttl(value, ttl))
    }

    async fn send_with_client_params(
        &self,
        endpoint: &str,
        mut params: BTreeMap<String, String>,
        token: Option<&AccessToken>,
    ) -> Result<GraphResponse, Error> {
        let app = self.client.require_app()?.clone();

        // Flow-specific params win over the client pair.
        params
            .entry("client_id".to_owned())
            .or_insert_with(|| app.id().to_owned());
        params
            .entry("client_secret".to_owned())
            .or_insert_with(|| app.secret().to_owned());

        let token = token.cloned().unwrap_or_else(|| app.access_token());
        let url = format!("{}{endpoint}", self.client.authorization_base_url());

        let request = GraphRequest::post(url)
            .params(params)
            .app(app)
            .access_token(token);

        self.client
            .dispatch(request, self.client.authorization_base_url())
            .await
    }
}
