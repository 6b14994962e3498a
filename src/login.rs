//! Redirect-based login.
//!
//! [`RedirectLoginHelper`] builds the browser URLs that start a login
//! (plain, re-request, re-authentication, logout) and completes the flow
//! by validating the redirect the user comes back on and exchanging its
//! authorization code for an access token. The CSRF `state` value survives
//! the round-trip through a [`PersistentDataStore`], which a web service
//! typically backs with its session layer.
//!
//! # Example
//!
//! ```rust,no_run
//! # use instagram_graph_rs::{Client, InMemoryStore};
//! # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let helper = client.login_helper(InMemoryStore::new());
//! let login_url = helper.login_url("https://example.com/callback", &["user_profile"])?;
//!
//! // ...the user logs in and comes back on the callback URL...
//! let redirect = "https://example.com/callback?code=abc&state=...";
//! let token = helper.access_token_from_redirect(redirect).await?;
//! # Ok(()) }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use url::form_urlencoded;
use url::Url;

use crate::auth::AccessToken;
use crate::error::{Error, MissingCredential};
use crate::oauth::OAuth2Client;
use crate::request::append_params_to_url;

/// The key the CSRF state is persisted under.
const STATE_KEY: &str = "state";

/// Where the browser is sent to end the user's session.
const LOGOUT_URL: &str = "https://www.instagram.com/logout.php";

/// Query parameters the redirect brings back that belong to the login
/// handshake, not to the caller's own redirect URL.
const LOGIN_PARAMS: [&str; 3] = ["code", "state", "enforce_https"];

const NO_EXTRA_PARAMS: [(&str, &str); 0] = [];

/// Key/value storage that survives the login redirect.
///
/// The helper persists the CSRF `state` under the `"state"` key before
/// sending the user away and reads it back when they return, so both
/// halves of the flow must see the same store (or the same backing
/// session).
pub trait PersistentDataStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);
}

impl<T: PersistentDataStore + ?Sized> PersistentDataStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value);
    }
}

/// A [`PersistentDataStore`] keeping values in process memory, for tests
/// and single-process tools.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentDataStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), value.to_owned());
    }
}

/// Drives the browser-redirect login flow.
///
/// Obtained from [`Client::login_helper`](crate::client::Client::login_helper).
/// [`login_url`](Self::login_url) builds the URL the user is sent to, and
/// [`access_token_from_redirect`](Self::access_token_from_redirect) turns
/// the URL they return on into an [`AccessToken`].
pub struct RedirectLoginHelper {
    oauth: OAuth2Client,
    store: Box<dyn PersistentDataStore>,
}

impl fmt::Debug for RedirectLoginHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectLoginHelper")
            .field("oauth", &self.oauth)
            .finish_non_exhaustive()
    }
}

impl RedirectLoginHelper {
    /// Creates a helper over an OAuth client and a state store.
    pub fn new(oauth: OAuth2Client, store: impl PersistentDataStore + 'static) -> Self {
        Self {
            oauth,
            store: Box::new(store),
        }
    }

    /// Returns the store the CSRF state is persisted in.
    pub fn store(&self) -> &dyn PersistentDataStore {
        self.store.as_ref()
    }

    /// Builds the URL to send a user to in order to log in.
    ///
    /// A CSRF `state` value is persisted in the store before this returns;
    /// it must still be there when the user comes back.
    pub fn login_url(&self, redirect_url: &str, scopes: &[&str]) -> Result<String, Error> {
        self.make_url(redirect_url, scopes, NO_EXTRA_PARAMS)
    }

    /// [`login_url`](Self::login_url) with extra query parameters merged
    /// into the authorization URL, winning over generated ones on
    /// collision.
    pub fn login_url_with_params<K, V>(
        &self,
        redirect_url: &str,
        scopes: &[&str],
        extra_params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, Error>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.make_url(redirect_url, scopes, extra_params)
    }

    /// Builds a login URL that re-asks for previously declined
    /// permissions.
    pub fn rerequest_url(&self, redirect_url: &str, scopes: &[&str]) -> Result<String, Error> {
        self.make_url(redirect_url, scopes, [("auth_type", "rerequest")])
    }

    /// Builds a login URL that makes the user re-authenticate.
    pub fn reauthentication_url(
        &self,
        redirect_url: &str,
        scopes: &[&str],
    ) -> Result<String, Error> {
        self.make_url(redirect_url, scopes, [("auth_type", "reauthenticate")])
    }

    /// Builds the URL that logs the user out of Instagram in the browser,
    /// sending them to `next` afterwards.
    ///
    /// App access tokens name no user session, so they are rejected.
    pub fn logout_url(&self, access_token: &AccessToken, next: &str) -> Result<String, Error> {
        if access_token.is_app_access_token() {
            return Err(Error::MissingCredentials(
                MissingCredential::UserAccessToken,
            ));
        }

        let mut params = BTreeMap::new();
        params.insert("next".to_owned(), next.to_owned());
        params.insert("access_token".to_owned(), access_token.value().to_owned());
        Ok(append_params_to_url(LOGOUT_URL, &params))
    }

    /// Completes the flow: validates the redirect the user returned on and
    /// exchanges its authorization code for an access token.
    ///
    /// The redirect's `state` must match the persisted one; the comparison
    /// is constant-time. The handshake parameters are stripped from
    /// `redirect_url` before it is replayed as the exchange's
    /// `redirect_uri`, which the token endpoint requires to match the
    /// login URL's.
    pub async fn access_token_from_redirect(
        &self,
        redirect_url: &str,
    ) -> Result<AccessToken, Error> {
        let code = query_param(redirect_url, "code")
            .ok_or(Error::Csrf("the redirect carried no `code` parameter"))?;
        self.validate_state(redirect_url)?;

        let redirect_uri = strip_login_params(redirect_url)?;
        self.oauth
            .get_access_token_from_code(code, redirect_uri)
            .await
    }

    /// The `error` query parameter of a redirect, set when authorization
    /// failed or the user declined.
    pub fn error(&self, redirect_url: &str) -> Option<String> {
        query_param(redirect_url, "error")
    }

    /// The `error_code` query parameter of a redirect.
    pub fn error_code(&self, redirect_url: &str) -> Option<String> {
        query_param(redirect_url, "error_code")
    }

    /// The `error_reason` query parameter of a redirect.
    pub fn error_reason(&self, redirect_url: &str) -> Option<String> {
        query_param(redirect_url, "error_reason")
    }

    /// The `error_description` query parameter of a redirect.
    pub fn error_description(&self, redirect_url: &str) -> Option<String> {
        query_param(redirect_url, "error_description")
    }

    /// Resolves the CSRF state (persisted, or freshly generated), persists
    /// it, and builds the authorization URL around it.
    fn make_url<K, V>(
        &self,
        redirect_url: &str,
        scopes: &[&str],
        extra_params: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, Error>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let state = self
            .store
            .get(STATE_KEY)
            .unwrap_or_else(|| hex::encode(rand::random::<[u8; 16]>()));
        self.store.set(STATE_KEY, &state);

        self.oauth
            .authorization_url(redirect_url, &state, scopes, extra_params)
    }

    fn validate_state(&self, redirect_url: &str) -> Result<(), Error> {
        let expected = self
            .store
            .get(STATE_KEY)
            .ok_or(Error::Csrf("no persisted `state` to validate against"))?;
        let received = query_param(redirect_url, "state")
            .ok_or(Error::Csrf("the redirect carried no `state` parameter"))?;

        if subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), received.as_bytes()).into() {
            Ok(())
        } else {
            Err(Error::Csrf(
                "the redirect `state` does not match the persisted one",
            ))
        }
    }
}

/// Reads one query parameter off a redirect URL.
fn query_param(redirect_url: &str, key: &str) -> Option<String> {
    let url = Url::parse(redirect_url).ok()?;
    let value = url
        .query_pairs()
        .find(|(name, _)| name.as_ref() == key)
        .map(|(_, value)| value.into_owned());
    value
}

/// Removes the login handshake parameters from a redirect URL so it can
/// serve as the `redirect_uri` of the code exchange.
fn strip_login_params(redirect_url: &str) -> Result<String, Error> {
    let mut url = Url::parse(redirect_url).map_err(Error::internal)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !LOGIN_PARAMS.contains(&name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        url.set_query(Some(&query));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;

    fn helper_with_store() -> (RedirectLoginHelper, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let client = Client::builder()
            .app("123456", "a1b2c3")
            .build()
            .unwrap();
        (client.login_helper(store.clone()), store)
    }

    #[test]
    fn login_url_persists_the_state_it_embeds() {
        let (helper, store) = helper_with_store();

        let url = helper
            .login_url("https://example.com/cb", &["user_profile"])
            .unwrap();

        let state = store.get("state").unwrap();
        assert_eq!(state.len(), 32);
        assert!(url.contains(&format!("state={state}")));

        // A second URL reuses the state already in flight.
        let again = helper
            .login_url("https://example.com/cb", &["user_profile"])
            .unwrap();
        assert!(again.contains(&format!("state={state}")));
    }

    #[test]
    fn login_url_reuses_a_seeded_state() {
        let (helper, store) = helper_with_store();
        store.set("state", "fixed-state");

        let url = helper.login_url("https://example.com/cb", &[]).unwrap();
        assert!(url.contains("state=fixed-state"));
    }

    #[test]
    fn rerequest_and_reauthentication_set_the_auth_type() {
        let (helper, _store) = helper_with_store();

        let rerequest = helper
            .rerequest_url("https://example.com/cb", &["user_media"])
            .unwrap();
        assert!(rerequest.contains("auth_type=rerequest"));

        let reauth = helper
            .reauthentication_url("https://example.com/cb", &["user_media"])
            .unwrap();
        assert!(reauth.contains("auth_type=reauthenticate"));
    }

    #[test]
    fn extra_login_params_merge_once() {
        let (helper, _store) = helper_with_store();

        let url = helper
            .login_url_with_params(
                "https://example.com/cb",
                &[],
                [("display", "page"), ("response_type", "token")],
            )
            .unwrap();

        assert_eq!(url.matches("display=page").count(), 1);
        assert!(url.contains("response_type=token"));
        assert!(!url.contains("response_type=code"));
    }

    #[test]
    fn logout_urls_only_work_with_user_tokens() {
        let (helper, _store) = helper_with_store();

        let url = helper
            .logout_url(&AccessToken::from("user-token"), "https://example.com")
            .unwrap();
        assert_eq!(
            url,
            "https://www.instagram.com/logout.php?access_token=user-token&next=https%3A%2F%2Fexample.com"
        );

        let err = helper
            .logout_url(&AccessToken::from("123456|a1b2c3"), "https://example.com")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCredentials(MissingCredential::UserAccessToken)
        ));
    }

    #[tokio::test]
    async fn the_redirect_must_carry_a_code() {
        let (helper, store) = helper_with_store();
        store.set("state", "abc");

        let err = helper
            .access_token_from_redirect("https://example.com/cb?state=abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Csrf(_)));
    }

    #[tokio::test]
    async fn the_redirect_state_must_match_the_persisted_one() {
        let (helper, store) = helper_with_store();
        store.set("state", "expected");

        let err = helper
            .access_token_from_redirect("https://example.com/cb?code=abc&state=tampered")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Csrf(_)));
    }

    #[tokio::test]
    async fn a_missing_persisted_state_fails_validation() {
        let (helper, _store) = helper_with_store();

        let err = helper
            .access_token_from_redirect("https://example.com/cb?code=abc&state=abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Csrf(_)));
    }

    #[test]
    fn handshake_params_are_stripped_from_the_redirect_url() {
        let cleaned =
            strip_login_params("https://example.com/cb?code=abc&state=xyz&enforce_https=1&page=2")
                .unwrap();
        assert_eq!(cleaned, "https://example.com/cb?page=2");

        let bare = strip_login_params("https://example.com/cb?code=abc&state=xyz").unwrap();
        assert_eq!(bare, "https://example.com/cb");
    }

    #[test]
    fn redirect_errors_are_readable() {
        let (helper, _store) = helper_with_store();
        let redirect = "https://example.com/cb?error=access_denied&error_code=200\
                        &error_reason=user_denied&error_description=Permissions+error";

        assert_eq!(helper.error(redirect).as_deref(), Some("access_denied"));
        assert_eq!(helper.error_code(redirect).as_deref(), Some("200"));
        assert_eq!(helper.error_reason(redirect).as_deref(), Some("user_denied"));
        assert_eq!(
            helper.error_description(redirect).as_deref(),
            Some("Permissions error")
        );
        assert_eq!(helper.error("https://example.com/cb?code=abc"), None);
    }
}
