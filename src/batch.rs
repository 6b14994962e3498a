//! Batched calls.
//!
//! A [`BatchRequest`] bundles up to fifty [`GraphRequest`]s into one wire
//! call. Each member is serialized into the envelope's `batch` parameter;
//! files move to the envelope root so member bodies stay url-encoded. The
//! array-shaped reply demultiplexes into a [`BatchResponse`], one
//! addressable [`GraphResponse`] per member.
//!
//! # Example
//!
//! ```rust,no_run
//! # use instagram_graph_rs::{Client, GraphRequest};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .app("app-id", "app-secret")
//!     .default_access_token("user-token")
//!     .build()?;
//!
//! let mut batch = client.new_batch();
//! batch.add_named("profile", GraphRequest::get("me"))?;
//! batch.add_named("media", GraphRequest::get("me/media"))?;
//!
//! let responses = client.send_batch(&batch).await?;
//! if let Some(profile) = responses.get("profile") {
//!     println!("profile payload: {}", profile.body());
//! }
//! # Ok(())
//! # }
//! ```

use serde_json::{Map, Value};

use crate::auth::{AccessToken, App};
use crate::error::{Error, MissingCredential};
use crate::request::{FileAttachment, GraphRequest, Method, RequestBody};
use crate::response::{GraphResponse, Headers};

/// The most sub-requests one batch may carry.
pub const MAX_BATCH_SIZE: usize = 50;

/// One member of a batch: the request, its optional name, and the per-item
/// options merged into its envelope entry.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    name: Option<String>,
    request: GraphRequest,
    options: Map<String, Value>,
    attached_files: Option<String>,
}

impl BatchEntry {
    /// The name responses to this member are addressable by.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The member request, with the batch fallbacks already applied.
    pub fn request(&self) -> &GraphRequest {
        &self.request
    }

    /// Per-item envelope options (e.g. `omit_response_on_success`).
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// The comma-joined names of the envelope files this member uploads.
    pub fn attached_files(&self) -> Option<&str> {
        self.attached_files.as_deref()
    }

    /// Serializes the member into its envelope entry.
    fn to_entry_value(&self) -> Result<Value, Error> {
        let headers = self
            .request
            .wire_headers()
            .into_iter()
            .map(|(name, value)| Value::String(format!("{name}: {value}")))
            .collect();

        let mut entry = Map::new();
        entry.insert("headers".to_owned(), Value::Array(headers));
        entry.insert(
            "method".to_owned(),
            Value::String(self.request.method().as_str().to_owned()),
        );
        entry.insert(
            "relative_url".to_owned(),
            Value::String(self.request.url()?),
        );

        // Files live on the envelope, so a member body is always
        // url-encoded.
        if self.request.method() != Method::Get {
            let body = RequestBody::url_encoded(&self.request.resolved_params()?);
            if !body.is_empty() {
                let body = String::from_utf8(body.bytes)
                    .map_err(|err| Error::internal(format!("non-UTF-8 member body: {err}")))?;
                entry.insert("body".to_owned(), Value::String(body));
            }
        }

        if let Some(name) = &self.name {
            entry.insert("name".to_owned(), Value::String(name.clone()));
        }
        for (key, value) in &self.options {
            // A per-item option may override any of the keys above.
            entry.insert(key.clone(), value.clone());
        }

        if let Some(files) = &self.attached_files {
            entry.insert("attached_files".to_owned(), Value::String(files.clone()));
        }

        Ok(Value::Object(entry))
    }
}

/// An ordered set of requests sent as one wire call.
///
/// Members inherit the batch's app, access token, and Graph version when
/// they carry none of their own; a member that still resolves no app or
/// token is rejected at [`add`](Self::add) time, before anything is sent.
/// Between one and [`MAX_BATCH_SIZE`] members must be present by the time
/// the batch is sent.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    app: Option<App>,
    access_token: Option<AccessToken>,
    graph_version: Option<String>,
    entries: Vec<BatchEntry>,
    files: Vec<FileAttachment>,
}

impl BatchRequest {
    /// Creates an empty batch with no fallbacks.
    /// [`Client::new_batch`](crate::client::Client::new_batch) presets the
    /// client's app, default token, and version instead.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the app members fall back to.
    pub fn fallback_app(mut self, app: App) -> Self {
        self.app = Some(app);
        self
    }

    /// Sets the access token members fall back to.
    pub fn fallback_access_token(mut self, token: impl Into<AccessToken>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the Graph version members fall back to.
    pub fn fallback_graph_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = Some(version.into());
        self
    }

    /// Adds an unnamed request. Its response will be addressable by index.
    pub fn add(&mut self, request: GraphRequest) -> Result<&mut Self, Error> {
        self.push(None, request, Map::new())
    }

    /// Adds a named request. Its response will be addressable by name.
    pub fn add_named(
        &mut self,
        name: impl Into<String>,
        request: GraphRequest,
    ) -> Result<&mut Self, Error> {
        self.push(Some(name.into()), request, Map::new())
    }

    /// Adds a request with per-item envelope options such as
    /// `omit_response_on_success` or `depends_on`.
    pub fn add_with_options(
        &mut self,
        name: Option<String>,
        request: GraphRequest,
        options: Map<String, Value>,
    ) -> Result<&mut Self, Error> {
        self.push(name, request, options)
    }

    /// Adds a sequence of named requests.
    pub fn add_all<N>(
        &mut self,
        requests: impl IntoIterator<Item = (N, GraphRequest)>,
    ) -> Result<&mut Self, Error>
    where
        N: Into<String>,
    {
        for (name, request) in requests {
            self.add_named(name, request)?;
        }
        Ok(self)
    }

    fn push(
        &mut self,
        name: Option<String>,
        mut request: GraphRequest,
        options: Map<String, Value>,
    ) -> Result<&mut Self, Error> {
        self.apply_fallbacks(&mut request)?;
        let attached_files = self.extract_files(&mut request);

        self.entries.push(BatchEntry {
            name,
            request,
            options,
            attached_files,
        });
        Ok(self)
    }

    fn apply_fallbacks(&self, request: &mut GraphRequest) -> Result<(), Error> {
        if request.app_ref().is_none() {
            match &self.app {
                Some(app) => request.set_app_fallback(app),
                None => return Err(Error::MissingCredentials(MissingCredential::BatchApp)),
            }
        }
        if request.access_token_ref().is_none() {
            match &self.access_token {
                Some(token) => request.set_token_fallback(token),
                None => {
                    return Err(Error::MissingCredentials(
                        MissingCredential::BatchAccessToken,
                    ))
                }
            }
        }
        if let Some(version) = &self.graph_version {
            request.set_version_fallback(version);
        }
        Ok(())
    }

    /// Moves a member's files to the envelope root, renaming them `file0`,
    /// `file1`, ... and returning the comma-joined list the member's entry
    /// references them by.
    fn extract_files(&mut self, request: &mut GraphRequest) -> Option<String> {
        if !request.has_files() {
            return None;
        }

        let mut names = Vec::new();
        for mut file in request.take_files() {
            let name = format!("file{}", self.files.len());
            file.rename(&name);
            names.push(name);
            self.files.push(file);
        }
        Some(names.join(","))
    }

    /// The members added so far, in order.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch has no members yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The files lifted out of members, now owned by the envelope.
    pub fn files(&self) -> &[FileAttachment] {
        &self.files
    }

    fn validate_count(&self) -> Result<(), Error> {
        let count = self.entries.len();
        if count == 0 || count > MAX_BATCH_SIZE {
            return Err(Error::BatchSize(count));
        }
        Ok(())
    }

    /// Builds the envelope request: a `POST` to the base carrying the
    /// serialized members in `batch`, `include_headers`, the extracted
    /// files, and the batch's own credentials.
    pub(crate) fn prepare(&self) -> Result<GraphRequest, Error> {
        self.validate_count()?;

        let entries = self
            .entries
            .iter()
            .map(BatchEntry::to_entry_value)
            .collect::<Result<Vec<_>, _>>()?;
        let batch_json = serde_json::to_string(&entries).map_err(Error::internal)?;

        let mut envelope = GraphRequest::post("")
            .param("batch", batch_json)
            .param("include_headers", "true");

        if let Some(app) = &self.app {
            envelope = envelope.app(app.clone());
        }
        if let Some(token) = &self.access_token {
            envelope = envelope.access_token(token.clone());
        }
        if let Some(version) = &self.graph_version {
            envelope = envelope.graph_version(version.clone());
        }
        for file in &self.files {
            envelope = envelope.file(file.clone());
        }

        Ok(envelope)
    }
}

/// The demultiplexed reply to a [`BatchRequest`].
///
/// Holds one [`GraphResponse`] per member, in batch order, each rebuilt
/// against the member's original request so classification and pagination
/// work per sub-response. A failed member never hides its siblings; check
/// [`GraphResponse::is_error`] per entry.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    envelope: GraphResponse,
    responses: Vec<(String, GraphResponse)>,
}

impl BatchResponse {
    /// Fans the envelope's array reply out into per-member responses.
    ///
    /// Member entries arrive as `{code, body, headers: [{name, value}]}`
    /// with the body as a JSON string. A `null` entry (e.g. under
    /// `omit_response_on_success`) becomes an empty `200` response, so a
    /// batch of N members always yields N results.
    pub(crate) fn new(batch: &BatchRequest, envelope: GraphResponse) -> Result<Self, Error> {
        let items = envelope.decoded_body().as_list().ok_or_else(|| {
            Error::internal(format!(
                "the batch reply was not a list: {}",
                envelope.body()
            ))
        })?;

        if items.len() != batch.len() {
            return Err(Error::internal(format!(
                "the batch reply held {} entries for {} requests",
                items.len(),
                batch.len()
            )));
        }

        let mut responses = Vec::with_capacity(items.len());
        for (index, (item, entry)) in items.iter().zip(batch.entries()).enumerate() {
            let key = entry
                .name()
                .map(str::to_owned)
                .unwrap_or_else(|| index.to_string());
            responses.push((key, Self::member_response(item, entry)?));
        }

        Ok(Self {
            envelope,
            responses,
        })
    }

    fn member_response(item: &Value, entry: &BatchEntry) -> Result<GraphResponse, Error> {
        let request = entry.request().clone();
        match item {
            Value::Null => Ok(GraphResponse::from_parts(
                request,
                200,
                Headers::new(),
                String::new(),
            )),
            Value::Object(reply) => {
                let status = reply
                    .get("code")
                    .and_then(crate::error::int_value)
                    .and_then(|code| u16::try_from(code).ok())
                    .unwrap_or(200);
                let body = reply
                    .get("body")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let headers = Self::normalize_headers(reply.get("headers"));
                Ok(GraphResponse::from_parts(request, status, headers, body))
            }
            other => Err(Error::internal(format!(
                "unexpected batch reply entry: {other}"
            ))),
        }
    }

    /// Batch replies list headers as `{name, value}` pairs; collapse them
    /// into a map.
    fn normalize_headers(headers: Option<&Value>) -> Headers {
        let mut normalized = Headers::new();
        if let Some(Value::Array(pairs)) = headers {
            for pair in pairs {
                let name = pair.get("name").and_then(Value::as_str);
                let value = pair.get("value").and_then(Value::as_str);
                if let (Some(name), Some(value)) = (name, value) {
                    normalized.insert(name, value);
                }
            }
        }
        normalized
    }

    /// The raw envelope response the members were unpacked from.
    pub fn envelope(&self) -> &GraphResponse {
        &self.envelope
    }

    /// Looks a member response up by its batch name, or by its stringified
    /// index for unnamed members.
    pub fn get(&self, key: &str) -> Option<&GraphResponse> {
        self.responses
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, response)| response)
    }

    /// The member response at a batch position.
    pub fn get_index(&self, index: usize) -> Option<&GraphResponse> {
        self.responses.get(index).map(|(_, response)| response)
    }

    /// Iterates the member responses in batch order, with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphResponse)> {
        self.responses
            .iter()
            .map(|(key, response)| (key.as_str(), response))
    }

    /// The number of member responses. Always equals the batch's length.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether there are no member responses.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl IntoIterator for BatchResponse {
    type Item = (String, GraphResponse);
    type IntoIter = std::vec::IntoIter<(String, GraphResponse)>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.into_iter()
    }
}
