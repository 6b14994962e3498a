//! App credentials and access tokens.
//!
//! [`App`] holds the application id/secret pair and derives the app access
//! token and per-request app secret proofs. [`AccessToken`] is the value
//! object attached to outgoing requests, carrying an optional expiry.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, MissingCredential};

/// Environment variable [`App::from_env`] reads the app ID from.
pub const APP_ID_ENV: &str = "INSTAGRAM_APP_ID";
/// Environment variable [`App::from_env`] reads the app secret from.
pub const APP_SECRET_ENV: &str = "INSTAGRAM_APP_SECRET";

/// Application credentials: the app id and the app secret.
///
/// An `App` can mint its own *app access token* (the `id|secret` form used
/// for app-level endpoints) and computes the `appsecret_proof` parameter
/// sent alongside user tokens. It round-trips through the single-string
/// `id|secret` form via [`Display`](fmt::Display) and [`FromStr`], and
/// serializes as that string.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct App {
    id: String,
    secret: String,
}

impl App {
    /// Creates app credentials from an id and a secret.
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// Returns the app ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the app secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Reads app credentials from [`APP_ID_ENV`] and [`APP_SECRET_ENV`].
    pub fn from_env() -> Result<Self, Error> {
        let id = env::var(APP_ID_ENV)
            .map_err(|_| Error::MissingCredentials(MissingCredential::AppId))?;
        let secret = env::var(APP_SECRET_ENV)
            .map_err(|_| Error::MissingCredentials(MissingCredential::AppSecret))?;
        Ok(Self::new(id, secret))
    }

    /// Returns an app access token in the `id|secret` form.
    pub fn access_token(&self) -> AccessToken {
        AccessToken::new(format!("{}|{}", self.id, self.secret))
    }

    /// Computes the `appsecret_proof` for a token: the HMAC-SHA256 of the
    /// token value keyed by the app secret, hex-encoded.
    pub fn secret_proof(&self, token: &AccessToken) -> Result<String, Error> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()).map_err(Error::internal)?;
        mac.update(token.value().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

// The secret stays out of debug output; requests and builders embed apps
// and derive Debug.
impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.id, self.secret)
    }
}

impl FromStr for App {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('|') {
            Some((id, secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok(Self::new(id, secret))
            }
            _ => Err(Error::internal(format!(
                "malformed app credentials: expected `id|secret`, got {s:?}"
            ))),
        }
    }
}

impl From<App> for String {
    fn from(app: App) -> Self {
        app.to_string()
    }
}

impl TryFrom<String> for App {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// An access token for the Graph API.
///
/// Tokens come from the OAuth exchanges on
/// [`OAuth2Client`](crate::oauth::OAuth2Client), from [`App::access_token`],
/// or from a raw string. The expiry is optional: a token without one is
/// treated as non-expiring (the wire value `0`). Serializable, so sessions
/// can persist a token alongside its expiry.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessToken {
    value: String,
    expires_at: Option<SystemTime>,
}

impl AccessToken {
    /// Wraps a raw token value with no known expiry.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Wraps a raw token value that expires at a known instant.
    pub fn with_expiry(value: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Builds a token from a value plus a time-to-live in seconds, the shape
    /// the OAuth endpoints reply with. A TTL of zero means non-expiring.
    pub(crate) fn from_ttl(value: impl Into<String>, ttl_seconds: u64) -> Self {
        let expires_at = if ttl_seconds == 0 {
            None
        } else {
            Some(SystemTime::now() + Duration::from_secs(ttl_seconds))
        };
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// The raw token string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The instant this token expires, when known.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Whether this is an app access token (`id|secret`), as opposed to a
    /// user token. App tokens contain exactly one `|` separator.
    pub fn is_app_access_token(&self) -> bool {
        self.value.bytes().filter(|&b| b == b'|').count() == 1
    }

    /// Whether the token's expiry has passed. Tokens without a known expiry
    /// are never considered expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at < SystemTime::now(),
            None => false,
        }
    }

    /// Whether the token is long-lived: an app token, or a token whose
    /// expiry lies more than two hours out.
    pub fn is_long_lived(&self) -> bool {
        match self.expires_at {
            Some(at) => at > SystemTime::now() + Duration::from_secs(2 * 60 * 60),
            None => self.is_app_access_token(),
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Writes the raw token value. Use only where the token itself has to go
/// on the wire; [`Debug`](fmt::Debug) redacts it.
impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&App> for AccessToken {
    fn from(app: &App) -> Self {
        app.access_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_access_token_joins_id_and_secret() {
        let app = App::new("123456789012345", "a1b2c3d4e5f6");
        assert_eq!(app.access_token().value(), "123456789012345|a1b2c3d4e5f6");
        assert!(app.access_token().is_app_access_token());
    }

    #[test]
    fn app_round_trips_through_a_string() {
        let app = App::new("123", "shhh");
        let parsed: App = app.to_string().parse().unwrap();
        assert_eq!(parsed, app);

        assert!("no-separator".parse::<App>().is_err());
        assert!("|missing-id".parse::<App>().is_err());
    }

    #[test]
    fn user_tokens_are_not_app_tokens() {
        assert!(!AccessToken::new("EAADdZBVs0jZBkBACZCmCZC").is_app_access_token());
        // Two separators is not the `id|secret` shape either.
        assert!(!AccessToken::new("a|b|c").is_app_access_token());
    }

    #[test]
    fn secret_proof_matches_a_known_hmac_vector() {
        let app = App::new("id", "key");
        let token = AccessToken::new("The quick brown fox jumps over the lazy dog");
        assert_eq!(
            app.secret_proof(&token).unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn app_falls_back_to_the_environment() {
        temp_env::with_vars(
            [
                (APP_ID_ENV, Some("777")),
                (APP_SECRET_ENV, Some("env-secret")),
            ],
            || {
                let app = App::from_env().unwrap();
                assert_eq!(app.id(), "777");
                assert_eq!(app.secret(), "env-secret");
            },
        );

        temp_env::with_vars([(APP_ID_ENV, None::<&str>), (APP_SECRET_ENV, None)], || {
            assert!(matches!(
                App::from_env(),
                Err(Error::MissingCredentials(MissingCredential::AppId))
            ));
        });
    }

    #[test]
    fn expiry_accounting() {
        let past = SystemTime::now() - Duration::from_secs(10);
        let soon = SystemTime::now() + Duration::from_secs(60);
        let far = SystemTime::now() + Duration::from_secs(90 * 24 * 60 * 60);

        assert!(AccessToken::with_expiry("t", past).is_expired());
        assert!(!AccessToken::with_expiry("t", soon).is_expired());
        assert!(!AccessToken::new("t").is_expired());

        assert!(AccessToken::with_expiry("t", far).is_long_lived());
        assert!(!AccessToken::with_expiry("t", soon).is_long_lived());
        assert!(AccessToken::new("123|secret").is_long_lived());
        assert!(!AccessToken::new("user-token").is_long_lived());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let app = App::new("123456", "super-secret");
        let rendered = format!("{app:?}");
        assert!(rendered.contains("123456"));
        assert!(!rendered.contains("super-secret"));

        let token = AccessToken::with_expiry(
            "EAAD-raw-token-value",
            SystemTime::now() + Duration::from_secs(3600),
        );
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("EAAD-raw-token-value"));
        assert!(rendered.contains("expires_at"));

        // Display stays the wire value; only Debug redacts.
        assert_eq!(token.to_string(), "EAAD-raw-token-value");
    }

    #[test]
    fn credentials_survive_serde() {
        let app = App::new("123", "shhh");
        let json = serde_json::to_string(&app).unwrap();
        assert_eq!(json, "\"123|shhh\"");
        assert_eq!(serde_json::from_str::<App>(&json).unwrap(), app);
        assert!(serde_json::from_str::<App>("\"no-separator\"").is_err());

        let token = AccessToken::with_expiry("tok", SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(serde_json::from_str::<AccessToken>(&json).unwrap(), token);
    }

    #[test]
    fn zero_ttl_means_non_expiring() {
        assert_eq!(AccessToken::from_ttl("t", 0).expires_at(), None);
        assert!(AccessToken::from_ttl("t", 3600).expires_at().is_some());
    }
}
