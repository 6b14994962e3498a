use instagram_graph_rs::{AccessToken, App, Client, ClientBuilder};
use url::form_urlencoded;
use wiremock::MockServer;

// --- CONSTANTS ---
#[allow(dead_code)]
pub const APP_ID: &str = "123456789012345";
#[allow(dead_code)]
pub const APP_SECRET: &str = "a1b2c3d4e5f6";
#[allow(dead_code)]
pub const ACCESS_TOKEN: &str = "EAADdZBVs0jZBkBACmCZCGZB7xZBZAZBkZD";

// --- TEST SETUP ---

/// A builder whose Graph and authorization hosts both point at the mock
/// server.
#[allow(dead_code)]
pub fn test_client_builder(server: &MockServer) -> ClientBuilder {
    Client::builder()
        .app(APP_ID, APP_SECRET)
        .default_access_token(ACCESS_TOKEN)
        .graph_base_url(server.uri())
        .authorization_base_url(server.uri())
}

#[allow(dead_code)]
pub fn test_client(server: &MockServer) -> Client {
    test_client_builder(server).build().unwrap()
}

/// The proof the client is expected to attach alongside the default token.
#[allow(dead_code)]
pub fn app_secret_proof() -> String {
    App::new(APP_ID, APP_SECRET)
        .secret_proof(&AccessToken::from(ACCESS_TOKEN))
        .unwrap()
}

// --- MATCHERS ---

/// Matches when the url-encoded form body carries `name=expected`.
#[allow(dead_code)]
pub fn form_param(name: &'static str, expected: &str) -> impl wiremock::Match + 'static {
    let expected = expected.to_owned();
    move |request: &wiremock::Request| {
        form_urlencoded::parse(&request.body)
            .any(|(key, value)| key == name && value == expected.as_str())
    }
}

/// Matches when any decoded value of the url-encoded form body contains
/// `needle`. Handy for peeking inside the serialized batch JSON.
#[allow(dead_code)]
pub fn form_value_contains(needle: &'static str) -> impl wiremock::Match + 'static {
    move |request: &wiremock::Request| {
        form_urlencoded::parse(&request.body).any(|(_, value)| value.contains(needle))
    }
}
