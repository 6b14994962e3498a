//! Graph API client implementation.
//!
//! This module provides the main client used to talk to the Instagram Graph
//! API. It owns the app credentials, the default access token, the Graph
//! version, and the [`Transport`] every call goes through, and it hands out
//! awaitable request builders for single calls, batches, and pagination.
//!
//! # Example – Creating a Client
//!
//! ```rust,no_run
//! use instagram_graph_rs::Client;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .app("your-app-id", "your-app-secret")
//!     .default_access_token("YOUR_ACCESS_TOKEN")
//!     .graph_version("v8.0")
//!     .build()?;
//! # Ok(()) }
//! ```
//!
//! # Example – Fetching a node
//!
//! ```rust,no_run
//! use instagram_graph_rs::Client;
//!
//! # async fn run(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let response = client.get("me").param("fields", "id,username").await?;
//! println!("profile: {}", response.body());
//! # Ok(()) }
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::TryStream;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::{AccessToken, App};
use crate::batch::{BatchRequest, BatchResponse};
use crate::edge::Edge;
use crate::error::{Error, MissingCredential, TransportError};
use crate::login::{PersistentDataStore, RedirectLoginHelper};
use crate::oauth::OAuth2Client;
use crate::request::{FileAttachment, GraphRequest, Method, OutgoingMessage};
use crate::response::{GraphResponse, Headers};

/// Graph version used when neither the client nor the request names one.
const DEFAULT_GRAPH_VERSION: &str = "v8.0";
/// Host single calls and batch envelopes go to.
const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.instagram.com";
/// Host authorization and token-exchange calls go to.
const DEFAULT_AUTHORIZATION_BASE_URL: &str = "https://api.instagram.com";
/// Connection establishment deadline for the default transport.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A raw HTTP reply, exactly as the [`Transport`] received it.
///
/// No decoding has happened yet: the body is the untouched text and the
/// status may well be a 4xx/5xx carrying a Graph error payload.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers as name/value pairs, in arrival order.
    pub headers: Vec<(String, String)>,
    /// The response body text.
    pub body: String,
}

/// The wire boundary every call crosses.
///
/// The client serializes each call into an [`OutgoingMessage`] and hands it
/// here; nothing below this trait knows any Graph semantics. A transport
/// must fail with a [`TransportError`] when no response was obtained at all
/// (connection refused, DNS, timeout) and must otherwise return whatever
/// status and body the server sent, including errors; interpreting those is
/// the client's job.
///
/// The default implementation is [`ReqwestTransport`]; tests swap in their
/// own to observe requests without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one message and returns the raw reply.
    async fn send(&self, message: &OutgoingMessage) -> Result<RawResponse, TransportError>;
}

/// The default [`Transport`], backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the crate's connect timeout. Per-request
    /// deadlines come from the message itself.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// Wraps an existing `reqwest::Client`, keeping its configuration.
    pub fn from_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, message: &OutgoingMessage) -> Result<RawResponse, TransportError> {
        (**self).send(message).await
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<RawResponse, TransportError> {
        let method = match message.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self
            .http
            .request(method, &message.url)
            .timeout(message.timeout);
        for (name, value) in &message.headers {
            request = request.header(name, value);
        }
        if !message.body.is_empty() {
            request = request.body(message.body.clone());
        }

        let response = request.send().await.map_err(TransportError::new)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(TransportError::new)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// The primary entry point for talking to the **Instagram Graph API**.
///
/// A `Client` bundles the app credentials, an optional default access token,
/// the Graph version, and the transport. It is cheap to clone and safe to
/// share across tasks; every clone observes the same request counter.
///
/// Requests resolve credentials at send time: a request that carries its own
/// token keeps it, anything else inherits the client default, and a request
/// with no resolvable token is rejected before touching the network.
///
/// # Example
///
/// ```rust,no_run
/// use instagram_graph_rs::Client;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .app("app-id", "app-secret")
///     .default_access_token("user-token")
///     .build()?;
///
/// let me = client.get("me").param("fields", "id,username").await?;
/// println!("{}", me.body());
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    app: Option<App>,
    default_access_token: Option<AccessToken>,
    graph_version: String,
    graph_base_url: String,
    authorization_base_url: String,
    transport: Arc<dyn Transport>,
    request_count: AtomicU64,
}

impl fmt::Debug for InnerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The token and transport stay out of debug output.
        f.debug_struct("InnerClient")
            .field("app", &self.app.as_ref().map(App::id))
            .field("graph_version", &self.graph_version)
            .field("graph_base_url", &self.graph_base_url)
            .field("authorization_base_url", &self.authorization_base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client with default configuration.
    ///
    /// This is the simplest way to get started. Use [`Client::builder`] to
    /// override the Graph version, base URLs, or transport.
    pub fn new(app: App, default_access_token: impl Into<AccessToken>) -> Result<Self, Error> {
        Self::builder()
            .app(app.id(), app.secret())
            .default_access_token(default_access_token)
            .build()
    }

    /// Starts building a client with custom settings.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Builds a client whose app comes from the `INSTAGRAM_APP_ID` and
    /// `INSTAGRAM_APP_SECRET` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::builder().app_from_env()?.build()
    }

    /// The app the client was configured with, if any.
    pub fn app(&self) -> Option<&App> {
        self.inner.app.as_ref()
    }

    /// The access token requests fall back to, if any.
    pub fn default_access_token(&self) -> Option<&AccessToken> {
        self.inner.default_access_token.as_ref()
    }

    /// The Graph version requests fall back to.
    pub fn graph_version(&self) -> &str {
        &self.inner.graph_version
    }

    /// How many wire calls this client (and its clones) have made.
    pub fn request_count(&self) -> u64 {
        self.inner.request_count.load(Ordering::Relaxed)
    }

    /// Prepares a `GET` request to an endpoint.
    ///
    /// The returned [`PendingRequest`] sends when `.await`ed.
    pub fn get(&self, endpoint: impl Into<String>) -> PendingRequest {
        self.pending(GraphRequest::get(endpoint))
    }

    /// Prepares a `POST` request to an endpoint.
    pub fn post(&self, endpoint: impl Into<String>) -> PendingRequest {
        self.pending(GraphRequest::post(endpoint))
    }

    /// Prepares a `DELETE` request to an endpoint.
    pub fn delete(&self, endpoint: impl Into<String>) -> PendingRequest {
        self.pending(GraphRequest::delete(endpoint))
    }

    fn pending(&self, request: GraphRequest) -> PendingRequest {
        PendingRequest {
            client: self.clone(),
            request,
        }
    }

    /// Sends a prepared [`GraphRequest`].
    ///
    /// Missing pieces inherit the client configuration: the app, the default
    /// access token, and the Graph version. A request that still resolves no
    /// access token fails before any network traffic. A reply carrying a
    /// Graph error payload is returned as [`Error::Graph`].
    pub async fn send_request(&self, mut request: GraphRequest) -> Result<GraphResponse, Error> {
        self.apply_defaults(&mut request)?;
        self.dispatch(request, &self.inner.graph_base_url).await
    }

    /// Sends a batch of requests as one wire call and fans the reply out
    /// into per-member responses.
    ///
    /// The envelope inherits the client credentials for anything the batch
    /// itself does not carry. A member-level error never fails the batch;
    /// inspect each [`GraphResponse`] in the result.
    pub async fn send_batch(&self, batch: &BatchRequest) -> Result<BatchResponse, Error> {
        let mut envelope = batch.prepare()?;
        self.apply_defaults(&mut envelope)?;
        let response = self.dispatch(envelope, &self.inner.graph_base_url).await?;
        BatchResponse::new(batch, response)
    }

    /// Creates an empty batch preloaded with this client's app, default
    /// token, and Graph version as member fallbacks.
    pub fn new_batch(&self) -> BatchRequest {
        let mut batch =
            BatchRequest::new().fallback_graph_version(self.inner.graph_version.clone());
        if let Some(app) = &self.inner.app {
            batch = batch.fallback_app(app.clone());
        }
        if let Some(token) = &self.inner.default_access_token {
            batch = batch.fallback_access_token(token.clone());
        }
        batch
    }

    /// Fetches the page after an edge.
    ///
    /// Returns `Ok(None)` when the edge advertises no next page, or when the
    /// next page exists but holds no items.
    pub async fn next(&self, edge: &Edge) -> Result<Option<Edge>, Error> {
        match edge.next_page_request()? {
            Some(request) => self.fetch_page(request).await,
            None => Ok(None),
        }
    }

    /// Fetches the page before an edge. Same termination rules as
    /// [`Client::next`].
    pub async fn previous(&self, edge: &Edge) -> Result<Option<Edge>, Error> {
        match edge.previous_page_request()? {
            Some(request) => self.fetch_page(request).await,
            None => Ok(None),
        }
    }

    async fn fetch_page(&self, request: GraphRequest) -> Result<Option<Edge>, Error> {
        let response = self.send_request(request).await?;
        let edge = Edge::from_response(&response)?;
        Ok(if edge.is_empty() { None } else { Some(edge) })
    }

    /// Consumes an edge and returns a stream that yields every node, fetching
    /// further pages on demand.
    ///
    /// The stream ends when a page advertises no successor or the next page
    /// is empty; a failed page fetch ends it with that error.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use futures::TryStreamExt;
    /// # use instagram_graph_rs::{Client, Edge};
    ///
    /// # async fn example(client: Client, edge: Edge) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut media = client.paginate(edge);
    /// while let Some(item) = media.try_next().await? {
    ///     println!("media id: {:?}", item.get("id"));
    /// }
    /// # Ok(()) }
    /// ```
    pub fn paginate(
        &self,
        first: Edge,
    ) -> impl TryStream<Ok = Map<String, Value>, Error = Error> + Send + 'static {
        let client = self.clone();
        Box::pin(try_stream! {
            let mut page = Some(first);
            while let Some(edge) = page.take() {
                // Compute the follow-up before the items consume the edge.
                let next = edge.next_page_request()?;

                for item in edge.into_items() {
                    yield item;
                }

                page = match next {
                    Some(request) => client.fetch_page(request).await?,
                    None => None,
                };
            }
        })
    }

    /// Returns the OAuth token-flow client bound to this client's app and
    /// authorization host.
    pub fn oauth(&self) -> OAuth2Client {
        OAuth2Client::new(self.clone())
    }

    /// Returns a redirect login helper that persists its CSRF state in
    /// `store`.
    pub fn login_helper<S>(&self, store: S) -> RedirectLoginHelper
    where
        S: PersistentDataStore + 'static,
    {
        RedirectLoginHelper::new(self.oauth(), store)
    }

    fn apply_defaults(&self, request: &mut GraphRequest) -> Result<(), Error> {
        if request.app_ref().is_none() {
            if let Some(app) = &self.inner.app {
                request.set_app_fallback(app);
            }
        }
        if request.access_token_ref().is_none() {
            match &self.inner.default_access_token {
                Some(token) => request.set_token_fallback(token),
                None => return Err(Error::MissingCredentials(MissingCredential::AccessToken)),
            }
        }
        if request.graph_version_ref().is_none() {
            request.set_version_fallback(&self.inner.graph_version);
        }
        Ok(())
    }

    /// Serializes and sends one request, then decodes the reply against it.
    pub(crate) async fn dispatch(
        &self,
        request: GraphRequest,
        base_url: &str,
    ) -> Result<GraphResponse, Error> {
        let message = request.to_message(base_url)?;
        self.inner.request_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            method = %message.method,
            endpoint = request.endpoint(),
            "sending Graph API request"
        );

        let raw = self.inner.transport.send(&message).await?;
        debug!(status = raw.status, "Graph API replied");

        let response =
            GraphResponse::from_parts(request, raw.status, Headers::from_pairs(raw.headers), raw.body);
        if let Some(error) = response.error() {
            debug!(
                kind = %error.kind(),
                code = error.code(),
                subcode = error.subcode(),
                "Graph API reported an error"
            );
            return Err(Error::Graph(Box::new(error.clone())));
        }
        Ok(response)
    }

    pub(crate) fn authorization_base_url(&self) -> &str {
        &self.inner.authorization_base_url
    }

    pub(crate) fn require_app(&self) -> Result<&App, Error> {
        self.inner
            .app
            .as_ref()
            .ok_or(Error::MissingCredentials(MissingCredential::App))
    }
}

/// Configures and creates a [`Client`].
///
/// # Example
/// ```rust,no_run
/// use instagram_graph_rs::client::ClientBuilder;
///
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new()
///     .app("app-id", "app-secret")
///     .default_access_token("token")
///     .build()?;
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    app: Option<App>,
    default_access_token: Option<AccessToken>,
    graph_version: Option<String>,
    graph_base_url: Option<String>,
    authorization_base_url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("app", &self.app.as_ref().map(App::id))
            .field("graph_version", &self.graph_version)
            .field("graph_base_url", &self.graph_base_url)
            .field("authorization_base_url", &self.authorization_base_url)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the app credentials.
    pub fn app(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.app = Some(App::new(id, secret));
        self
    }

    /// Reads the app credentials from the `INSTAGRAM_APP_ID` and
    /// `INSTAGRAM_APP_SECRET` environment variables.
    pub fn app_from_env(mut self) -> Result<Self, Error> {
        self.app = Some(App::from_env()?);
        Ok(self)
    }

    /// Sets the access token requests fall back to when they carry none.
    pub fn default_access_token(mut self, token: impl Into<AccessToken>) -> Self {
        self.default_access_token = Some(token.into());
        self
    }

    /// Sets the Graph version (e.g. `"v8.0"`) requests fall back to.
    pub fn graph_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = Some(version.into());
        self
    }

    /// Overrides the Graph host. Mainly for pointing tests at a local
    /// server.
    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.graph_base_url = Some(url.into());
        self
    }

    /// Overrides the authorization host used by the OAuth flows.
    pub fn authorization_base_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_base_url = Some(url.into());
        self
    }

    /// Replaces the wire transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Finishes building the client.
    ///
    /// Constructs the default [`ReqwestTransport`] when none was supplied;
    /// that construction is the only fallible step.
    pub fn build(self) -> Result<Client, Error> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(InnerClient {
                app: self.app,
                default_access_token: self.default_access_token,
                graph_version: self
                    .graph_version
                    .unwrap_or_else(|| DEFAULT_GRAPH_VERSION.to_owned()),
                graph_base_url: self
                    .graph_base_url
                    .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_owned()),
                authorization_base_url: self
                    .authorization_base_url
                    .unwrap_or_else(|| DEFAULT_AUTHORIZATION_BASE_URL.to_owned()),
                transport,
                request_count: AtomicU64::new(0),
            }),
        })
    }
}

/// An awaitable single call.
///
/// Returned by [`Client::get`], [`Client::post`], and [`Client::delete`].
/// Builder methods refine the underlying [`GraphRequest`]; the call is made
/// when the instance is `.await`ed or [`execute`](Self::execute)d.
#[must_use = "PendingRequest does nothing unless you `.await` or `.execute().await` it"]
#[derive(Debug)]
pub struct PendingRequest {
    client: Client,
    request: GraphRequest,
}

impl PendingRequest {
    /// Adds a request parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.param(key, value);
        self
    }

    /// Adds many request parameters.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.request = self.request.params(params);
        self
    }

    /// Overrides the access token for this call only.
    pub fn access_token(mut self, token: impl Into<AccessToken>) -> Self {
        self.request = self.request.access_token(token);
        self
    }

    /// Sends `If-None-Match` so an unchanged resource answers `304` with an
    /// empty body.
    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.request = self.request.etag(etag);
        self
    }

    /// Overrides the Graph version for this call only.
    pub fn graph_version(mut self, version: impl Into<String>) -> Self {
        self.request = self.request.graph_version(version);
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    /// Attaches a file, making the request body multipart.
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.request = self.request.file(file);
        self
    }

    /// Gives up the client binding and returns the bare request, e.g. for
    /// adding it to a batch.
    pub fn into_request(self) -> GraphRequest {
        self.request
    }

    /// Executes the call.
    ///
    /// Awaiting the `PendingRequest` directly calls this internally.
    pub async fn execute(self) -> Result<GraphResponse, Error> {
        self.client.send_request(self.request).await
    }
}

impl IntoFuture for PendingRequest {
    type Output = Result<GraphResponse, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{APP_ID_ENV, APP_SECRET_ENV};
    use crate::error::ErrorKind;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves canned replies and records what it was asked to send.
    struct StaticTransport {
        replies: Mutex<VecDeque<RawResponse>>,
        seen: Mutex<Vec<OutgoingMessage>>,
    }

    impl StaticTransport {
        fn new(replies: impl IntoIterator<Item = RawResponse>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn ok(body: &str) -> RawResponse {
            RawResponse {
                status: 200,
                headers: Vec::new(),
                body: body.to_owned(),
            }
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn send(&self, message: &OutgoingMessage) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(message.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::new("no canned reply left"))
        }
    }

    fn client_with(transport: StaticTransport) -> (Client, Arc<StaticTransport>) {
        let transport = Arc::new(transport);
        let client = Client::builder()
            .app("123456", "secret")
            .default_access_token("default-token")
            .graph_base_url("https://graph.test")
            .transport(transport.clone())
            .build()
            .unwrap();
        (client, transport)
    }

    #[test]
    fn builder_defaults() {
        let client = Client::builder().build().unwrap();
        assert_eq!(client.graph_version(), "v8.0");
        assert_eq!(client.inner.graph_base_url, "https://graph.instagram.com");
        assert_eq!(
            client.inner.authorization_base_url,
            "https://api.instagram.com"
        );
        assert_eq!(client.request_count(), 0);
        assert!(client.app().is_none());
    }

    #[test]
    fn builder_reads_the_app_from_the_environment() {
        temp_env::with_vars(
            [
                (APP_ID_ENV, Some("424242")),
                (APP_SECRET_ENV, Some("env-secret")),
            ],
            || {
                let client = Client::from_env().unwrap();
                assert_eq!(client.app().unwrap().id(), "424242");
            },
        );

        temp_env::with_vars([(APP_ID_ENV, None::<&str>), (APP_SECRET_ENV, None)], || {
            assert!(matches!(
                Client::from_env(),
                Err(Error::MissingCredentials(MissingCredential::AppId))
            ));
        });
    }

    #[tokio::test]
    async fn missing_token_fails_before_the_network() {
        let transport = Arc::new(StaticTransport::new([]));
        let client = Client::builder()
            .app("123456", "secret")
            .graph_base_url("https://graph.test")
            .transport(transport.clone())
            .build()
            .unwrap();

        let err = client.get("me").await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCredentials(MissingCredential::AccessToken)
        ));
        assert!(transport.seen.lock().unwrap().is_empty());
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn default_credentials_reach_the_wire() {
        let (client, transport) =
            client_with(StaticTransport::new([StaticTransport::ok("{\"id\":\"1\"}")]));

        let response = client.get("me").param("fields", "id").await.unwrap();
        assert_eq!(response.http_status(), 200);
        assert_eq!(client.request_count(), 1);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let url = &seen[0].url;
        assert!(url.starts_with("https://graph.test/v8.0/me?"));
        assert!(url.contains("access_token=default-token"));
        assert!(url.contains("appsecret_proof="));
        assert!(url.contains("fields=id"));
    }

    #[tokio::test]
    async fn graph_errors_surface_at_the_send_boundary() {
        let (client, _) = client_with(StaticTransport::new([RawResponse {
            status: 401,
            headers: Vec::new(),
            body: "{\"error\":{\"message\":\"bad token\",\"type\":\"OAuthException\",\"code\":190}}"
                .to_owned(),
        }]));

        let err = client.get("me").await.unwrap_err();
        match err {
            Error::Graph(graph) => {
                assert_eq!(*graph.kind(), ErrorKind::Authentication);
                assert_eq!(graph.http_status(), 401);
            }
            other => panic!("expected a Graph error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn per_request_token_beats_the_default() {
        let (client, transport) =
            client_with(StaticTransport::new([StaticTransport::ok("{}")]));

        client
            .get("me")
            .access_token("own-token")
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert!(seen[0].url.contains("access_token=own-token"));
        assert!(!seen[0].url.contains("access_token=default-token"));
    }

    #[tokio::test]
    async fn the_request_counter_spans_clones() {
        let (client, _) = client_with(StaticTransport::new([
            StaticTransport::ok("{}"),
            StaticTransport::ok("{}"),
        ]));

        client.get("me").await.unwrap();
        client.clone().get("me/media").await.unwrap();
        assert_eq!(client.request_count(), 2);
    }
}
