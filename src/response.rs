//! Response decoding.
//!
//! [`GraphResponse`] pairs the raw transport reply with the request that
//! produced it, decodes the heterogeneous body shapes the Graph API sends
//! into a [`DecodedBody`], and eagerly classifies error payloads so callers
//! can inspect a failed response without re-parsing it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::GraphApiError;
use crate::request::GraphRequest;

/// Response headers with case-insensitive names. When a name repeats, the
/// last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, String>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects headers from name/value pairs.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.insert(name.into(), value.into());
        }
        headers
    }

    /// Inserts a header, replacing any previous value for the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// Looks a header up by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Iterates over the headers in lowercased-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A decoded response body: either a keyed object or an ordered list.
///
/// The Graph API answers most calls with a JSON object, batch envelopes
/// with a JSON array, token endpoints sometimes with form-urlencoded text,
/// and a few legacy endpoints with a bare boolean or id. The decoder
/// normalizes all of those into one of these two containers.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    /// A keyed payload.
    Object(Map<String, Value>),
    /// An ordered payload, as batch envelopes reply with.
    List(Vec<Value>),
}

impl DecodedBody {
    /// Decodes a raw body.
    ///
    /// JSON objects and arrays keep their shape. A bare boolean becomes
    /// `{"success": bool}` and a bare number (or numeric string) becomes
    /// `{"id": value}`, preserving the value as sent. Anything that is not
    /// valid JSON is parsed as a form-urlencoded key/value body, which
    /// yields an empty object when nothing matches.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Self::Object(map),
            Ok(Value::Array(items)) => Self::List(items),
            Ok(Value::Bool(flag)) => {
                let mut map = Map::new();
                map.insert("success".to_owned(), Value::Bool(flag));
                Self::Object(map)
            }
            Ok(Value::Number(id)) => {
                let mut map = Map::new();
                map.insert("id".to_owned(), Value::Number(id));
                Self::Object(map)
            }
            Ok(Value::String(s)) if is_numeric(&s) => {
                let mut map = Map::new();
                map.insert("id".to_owned(), Value::String(s));
                Self::Object(map)
            }
            Ok(_) => Self::Object(Map::new()),
            Err(_) => Self::form_fallback(raw),
        }
    }

    fn form_fallback(raw: &str) -> Self {
        let mut map = Map::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key.is_empty() {
                continue;
            }
            map.insert(key.into_owned(), Value::String(value.into_owned()));
        }
        Self::Object(map)
    }

    /// The object form, when this body is one.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            Self::List(_) => None,
        }
    }

    /// The list form, when this body is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::Object(_) => None,
            Self::List(items) => Some(items),
        }
    }

    /// Looks a key up in the object form.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

/// A decoded reply to a single [`GraphRequest`].
///
/// Constructed from the transport's raw status/headers/body. The body is
/// decoded once, on construction; if the decoded payload carries an `error`
/// key, the classified [`GraphApiError`] is built immediately and held for
/// inspection. The send boundary turns it into a failure, but a response in
/// hand never panics or hides data.
#[derive(Debug, Clone)]
pub struct GraphResponse {
    request: GraphRequest,
    status: u16,
    headers: Headers,
    body: String,
    decoded: DecodedBody,
    error: Option<GraphApiError>,
}

impl GraphResponse {
    pub(crate) fn new(request: GraphRequest, status: u16, headers: Headers, body: String) -> Self {
        let decoded = DecodedBody::decode(&body);
        let error = decoded
            .as_object()
            .filter(|map| map.contains_key("error"))
            .map(|map| GraphApiError::classify(map, status, &body));

        Self {
            request,
            status,
            headers,
            body,
            decoded,
            error,
        }
    }

    /// The request this response answers.
    pub fn request(&self) -> &GraphRequest {
        &self.request
    }

    /// The HTTP status code.
    pub fn http_status(&self) -> u16 {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The raw, unparsed body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The decoded body.
    pub fn decoded_body(&self) -> &DecodedBody {
        &self.decoded
    }

    /// Whether the payload reported an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The classified error this response carries, if any.
    pub fn error(&self) -> Option<&GraphApiError> {
        self.error.as_ref()
    }

    /// The entity tag for conditional re-fetching, when the API sent one.
    pub fn etag(&self) -> Option<&str> {
        self.headers.get("ETag")
    }

    /// The Graph version that served this response, when reported.
    pub fn graph_version(&self) -> Option<&str> {
        self.headers.get("Instagram-API-Version")
    }

    /// Reads an integer field off the object body, tolerating the numeric
    /// strings form-decoded bodies produce.
    pub(crate) fn int_field(&self, key: &str) -> Option<i64> {
        self.decoded.get(key).and_then(crate::error::int_value)
    }

    /// Reads a string field off the object body.
    pub(crate) fn str_field(&self, key: &str) -> Option<&str> {
        self.decoded.get(key).and_then(Value::as_str)
    }

    /// Builds a response from already-received parts, for callers that
    /// drive their own transport. Most code receives responses from
    /// [`Client`](crate::client::Client) instead.
    pub fn from_parts(
        request: GraphRequest,
        status: u16,
        headers: Headers,
        body: impl Into<String>,
    ) -> Self {
        Self::new(request, status, headers, body.into())
    }
}
