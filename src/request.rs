//! Request building.
//!
//! [`GraphRequest`] models one logical Graph API call: endpoint, method,
//! parameters, headers, credentials, an optional conditional-fetch tag, and
//! optional file attachments. [`GraphRequest::to_message`] turns it into the
//! transport-ready [`OutgoingMessage`], handling version prefixing, query
//! assembly, and url-encoded or multipart body encoding.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use url::form_urlencoded;

use crate::auth::{AccessToken, App};
use crate::error::Error;

/// Timeout applied to requests without file attachments.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout applied to requests carrying non-video file attachments.
pub const DEFAULT_FILE_UPLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Timeout applied to requests carrying at least one video attachment.
pub const DEFAULT_VIDEO_UPLOAD_TIMEOUT: Duration = Duration::from_secs(7200);

/// The HTTP methods the Graph API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    /// The wire form of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file to upload with a request.
///
/// `name` is the multipart form-field name (e.g. `source`), `file_name` the
/// name reported in the part's disposition. The content type is sniffed from
/// the leading bytes when not set explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    name: String,
    file_name: String,
    contents: Vec<u8>,
    mime: Option<String>,
}

impl FileAttachment {
    /// Creates an attachment from in-memory bytes, sniffing its content
    /// type.
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        let contents = contents.into();
        let mime = infer::get(&contents).map(|kind| kind.mime_type().to_owned());
        Self {
            name: name.into(),
            file_name: file_name.into(),
            contents,
            mime,
        }
    }

    /// Reads an attachment from disk. The file name is taken from the path.
    pub async fn from_path(name: impl Into<String>, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, file_name, contents))
    }

    /// Overrides the sniffed content type.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// The multipart form-field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file name reported to the API.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The attachment's content type, when known.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    /// Whether the attachment carries video content. Video uploads get a
    /// longer request deadline than other files.
    pub fn is_video(&self) -> bool {
        self.mime
            .as_deref()
            .is_some_and(|mime| mime.starts_with("video/"))
    }

    pub(crate) fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

/// One logical Graph API call, not yet sent.
///
/// Requests are assembled with the by-value builder methods and either
/// handed to [`Client::send_request`](crate::client::Client::send_request)
/// or added to a [`BatchRequest`](crate::batch::BatchRequest).
///
/// Two parameter names receive special treatment when set through
/// [`param`](Self::param)/[`params`](Self::params): `access_token` is
/// promoted to the request's token instead of staying a parameter, and
/// `appsecret_proof` is dropped (the proof is always computed, never
/// caller-supplied).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRequest {
    app: Option<App>,
    access_token: Option<AccessToken>,
    method: Method,
    endpoint: String,
    params: BTreeMap<String, String>,
    etag: Option<String>,
    graph_version: Option<String>,
    headers: Vec<(String, String)>,
    files: Vec<FileAttachment>,
}

impl GraphRequest {
    /// Creates a bare request with no credentials attached.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            app: None,
            access_token: None,
            method,
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            etag: None,
            graph_version: None,
            headers: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    /// Shorthand for a `POST` request.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    /// Shorthand for a `DELETE` request.
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    /// Sets the app whose secret signs the request.
    pub fn app(mut self, app: App) -> Self {
        self.app = Some(app);
        self
    }

    /// Sets the access token for this request.
    pub fn access_token(mut self, token: impl Into<AccessToken>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Adds one parameter, applying the `access_token`/`appsecret_proof`
    /// promotion rules.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_param(key.into(), value.into());
        self
    }

    /// Adds a set of parameters, applying the promotion rules to each.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.insert_param(key.into(), value.into());
        }
        self
    }

    /// Sets the `If-None-Match` tag for a conditional fetch.
    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Overrides the Graph version segment for this request.
    pub fn graph_version(mut self, version: impl Into<String>) -> Self {
        self.graph_version = Some(version.into());
        self
    }

    /// Adds a header to send with the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a file, switching the request body to multipart.
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    fn insert_param(&mut self, key: String, value: String) {
        match key.as_str() {
            "access_token" => self.access_token = Some(AccessToken::new(value)),
            "appsecret_proof" => {}
            _ => {
                self.params.insert(key, value);
            }
        }
    }

    /// The request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The endpoint as given, before version prefixing.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The caller-supplied parameters.
    pub fn params_ref(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// The access token this request will authenticate with, if set.
    pub fn access_token_ref(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// The app signing this request, if set.
    pub fn app_ref(&self) -> Option<&App> {
        self.app.as_ref()
    }

    /// The conditional-fetch tag, if set.
    pub fn etag_ref(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// The per-request Graph version override, if set.
    pub fn graph_version_ref(&self) -> Option<&str> {
        self.graph_version.as_deref()
    }

    /// The attached files.
    pub fn files_ref(&self) -> &[FileAttachment] {
        &self.files
    }

    /// Whether the request uploads files.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Whether any attached file is a video. Selects the longest timeout
    /// tier.
    pub fn has_video_files(&self) -> bool {
        self.files.iter().any(FileAttachment::is_video)
    }

    /// The deadline for this request: plain calls get
    /// [`DEFAULT_REQUEST_TIMEOUT`], file uploads
    /// [`DEFAULT_FILE_UPLOAD_TIMEOUT`], and video uploads
    /// [`DEFAULT_VIDEO_UPLOAD_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        if self.has_video_files() {
            DEFAULT_VIDEO_UPLOAD_TIMEOUT
        } else if self.has_files() {
            DEFAULT_FILE_UPLOAD_TIMEOUT
        } else {
            DEFAULT_REQUEST_TIMEOUT
        }
    }

    pub(crate) fn set_app_fallback(&mut self, app: &App) {
        if self.app.is_none() {
            self.app = Some(app.clone());
        }
    }

    pub(crate) fn set_token_fallback(&mut self, token: &AccessToken) {
        if self.access_token.is_none() {
            self.access_token = Some(token.clone());
        }
    }

    pub(crate) fn set_version_fallback(&mut self, version: &str) {
        if self.graph_version.is_none() {
            self.graph_version = Some(version.to_owned());
        }
    }

    pub(crate) fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    pub(crate) fn take_files(&mut self) -> Vec<FileAttachment> {
        std::mem::take(&mut self.files)
    }

    /// Whether the endpoint is a full URL rather than a Graph path.
    pub(crate) fn has_absolute_endpoint(&self) -> bool {
        self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")
    }

    /// The parameters as they go on the wire: caller params plus
    /// `access_token` and, when an app is present to compute it,
    /// `appsecret_proof`.
    pub(crate) fn resolved_params(&self) -> Result<BTreeMap<String, String>, Error> {
        let mut params = self.params.clone();
        if let Some(token) = &self.access_token {
            params.insert("access_token".to_owned(), token.value().to_owned());
            if let Some(app) = &self.app {
                params.insert("appsecret_proof".to_owned(), app.secret_proof(token)?);
            }
        }
        Ok(params)
    }

    /// The relative URL for this request: the version-prefixed endpoint,
    /// with the resolved parameters merged into the query for `GET`.
    /// Parameters already present in the endpoint's query win over request
    /// parameters, so re-sending a pagination URL never duplicates keys.
    pub(crate) fn url(&self) -> Result<String, Error> {
        let mut path = if self.has_absolute_endpoint() {
            self.endpoint.clone()
        } else {
            // An empty endpoint addresses the base itself (the batch
            // envelope).
            let mut path = if self.endpoint.is_empty() || self.endpoint.starts_with('/') {
                self.endpoint.clone()
            } else {
                format!("/{}", self.endpoint)
            };

            if let Some(version) = &self.graph_version {
                if !has_version_prefix(&path) {
                    let version = version.strip_prefix('/').unwrap_or(version);
                    path = format!("/{version}{path}");
                }
            }
            path
        };

        if self.method == Method::Get {
            path = append_params_to_url(&path, &self.resolved_params()?);
        }

        Ok(path)
    }

    /// The request body: empty for `GET`, url-encoded parameters for
    /// `POST`/`DELETE`, multipart when files are attached.
    pub(crate) fn body(&self) -> Result<RequestBody, Error> {
        if self.method == Method::Get {
            return Ok(RequestBody::empty());
        }

        let params = self.resolved_params()?;
        if self.files.is_empty() {
            Ok(RequestBody::url_encoded(&params))
        } else {
            Ok(RequestBody::multipart(&params, &self.files))
        }
    }

    /// The headers this request sends: the default agent, the conditional
    /// tag when set, then any caller-supplied headers. The body's
    /// `Content-Type` is appended separately by
    /// [`to_message`](Self::to_message); batch member entries never carry
    /// one.
    pub(crate) fn wire_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "User-Agent".to_owned(),
            concat!("instagram-graph-rs/", env!("CARGO_PKG_VERSION")).to_owned(),
        )];
        if let Some(etag) = &self.etag {
            headers.push(("If-None-Match".to_owned(), etag.clone()));
        }
        headers.extend(self.headers.iter().cloned());
        headers
    }

    /// Serializes the request into a transport-ready message against the
    /// given base URL. Absolute endpoints ignore the base.
    pub(crate) fn to_message(&self, base_url: &str) -> Result<OutgoingMessage, Error> {
        let relative = self.url()?;
        let url = if self.has_absolute_endpoint() {
            relative
        } else {
            format!("{}{relative}", base_url.trim_end_matches('/'))
        };

        let mut headers = self.wire_headers();

        let body = self.body()?;
        if let Some(content_type) = body.content_type {
            headers.push(("Content-Type".to_owned(), content_type));
        }

        Ok(OutgoingMessage {
            url,
            method: self.method,
            headers,
            body: body.bytes,
            timeout: self.timeout(),
        })
    }
}

/// An encoded request body plus the content type that describes it.
pub(crate) struct RequestBody {
    pub(crate) bytes: Vec<u8>,
    pub(crate) content_type: Option<String>,
}

impl RequestBody {
    fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            content_type: None,
        }
    }

    pub(crate) fn url_encoded(params: &BTreeMap<String, String>) -> Self {
        Self {
            bytes: encode_params(params).into_bytes(),
            content_type: Some("application/x-www-form-urlencoded".to_owned()),
        }
    }

    fn multipart(params: &BTreeMap<String, String>, files: &[FileAttachment]) -> Self {
        let boundary = hex::encode(rand::random::<[u8; 16]>());
        let mut bytes = Vec::new();

        for (key, value) in params {
            bytes.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }

        for file in files {
            bytes.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    file.name, file.file_name
                )
                .as_bytes(),
            );
            if let Some(mime) = &file.mime {
                bytes.extend_from_slice(format!("Content-Type: {mime}\r\n").as_bytes());
            }
            bytes.extend_from_slice(b"\r\n");
            bytes.extend_from_slice(&file.contents);
            bytes.extend_from_slice(b"\r\n");
        }

        bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Self {
            bytes,
            content_type: Some(format!("multipart/form-data; boundary={boundary}")),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A fully serialized request, ready for a
/// [`Transport`](crate::client::Transport).
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// The absolute URL to send to.
    pub url: String,
    /// The HTTP method.
    pub method: Method,
    /// Headers to send, in order.
    pub headers: Vec<(String, String)>,
    /// The raw body bytes. Empty for `GET`.
    pub body: Vec<u8>,
    /// The deadline for the whole request.
    pub timeout: Duration,
}

pub(crate) fn encode_params(params: &BTreeMap<String, String>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Merges params into a path's query string. Pairs already present in the
/// path win over the new params.
pub(crate) fn append_params_to_url(path: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return path.to_owned();
    }

    let (path, existing_query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut merged = params.clone();
    if let Some(query) = existing_query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            merged.insert(key.into_owned(), value.into_owned());
        }
    }

    format!("{path}?{}", encode_params(&merged))
}

/// Whether a path already starts with a `/vN.N/` version segment.
fn has_version_prefix(path: &str) -> bool {
    path.strip_prefix("/v")
        .and_then(|rest| rest.split_once('/'))
        .and_then(|(version, _)| version.split_once('.'))
        .is_some_and(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.bytes().all(|b| b.is_ascii_digit())
                && minor.bytes().all(|b| b.is_ascii_digit())
        })
}
