//! Cursor-based pagination.
//!
//! An [`Edge`] is a page of nodes plus the paging metadata the Graph API
//! returned with it. It can mint the follow-up [`GraphRequest`] for the next
//! or previous page; [`Client::next`](crate::client::Client::next) and
//! [`Client::previous`](crate::client::Client::previous) drive the loop.

use serde_json::{Map, Value};

use crate::error::Error;
use crate::request::{GraphRequest, Method};
use crate::response::GraphResponse;

/// Which way to walk a paginated collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingDirection {
    /// Towards newer pages, via `paging.next` / `paging.cursors.after`.
    Next,
    /// Towards older pages, via `paging.previous` / `paging.cursors.before`.
    Previous,
}

impl PagingDirection {
    fn page_key(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }

    fn cursor_key(&self) -> &'static str {
        match self {
            Self::Next => "after",
            Self::Previous => "before",
        }
    }
}

/// One page of a paginated collection.
///
/// `items` holds the page's nodes (the payload's `data` list); everything
/// else the payload carried (`paging`, `summary`, ...) is kept as metadata.
/// The request that produced the page is retained so pagination can clone
/// its method and credentials.
#[derive(Debug, Clone)]
pub struct Edge {
    request: GraphRequest,
    items: Vec<Map<String, Value>>,
    meta: Map<String, Value>,
    parent_endpoint: Option<String>,
}

impl Edge {
    /// Assembles an edge from parts. Use [`Edge::from_response`] for edges
    /// that came straight off the wire; this constructor exists for pages
    /// embedded in a larger node, where `parent_endpoint` names the field
    /// they hang off.
    pub fn new(
        request: GraphRequest,
        items: Vec<Map<String, Value>>,
        meta: Map<String, Value>,
        parent_endpoint: Option<String>,
    ) -> Self {
        Self {
            request,
            items,
            meta,
            parent_endpoint,
        }
    }

    /// Interprets a response as an edge.
    ///
    /// The decoded body must be an object with a `data` list of nodes.
    /// Every other key of the body becomes the edge's metadata.
    pub fn from_response(response: &GraphResponse) -> Result<Self, Error> {
        let body = response
            .decoded_body()
            .as_object()
            .ok_or_else(|| Error::internal("cannot read an edge out of a list-shaped response"))?;

        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::internal("the response has no `data` list to paginate over"))?;

        let mut items = Vec::with_capacity(data.len());
        for node in data {
            match node {
                Value::Object(map) => items.push(map.clone()),
                other => {
                    return Err(Error::internal(format!(
                        "edge data held a non-object node: {other}"
                    )))
                }
            }
        }

        let meta = body
            .iter()
            .filter(|(key, _)| key.as_str() != "data")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self::new(response.request().clone(), items, meta, None))
    }

    /// The nodes on this page.
    pub fn items(&self) -> &[Map<String, Value>] {
        &self.items
    }

    /// Consumes the edge, returning its nodes.
    pub fn into_items(self) -> Vec<Map<String, Value>> {
        self.items
    }

    /// The number of nodes on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page holds no nodes. An empty page ends pagination.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The paging/summary metadata that came with the page.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    /// The request that produced this page.
    pub fn request(&self) -> &GraphRequest {
        &self.request
    }

    /// The field this edge hangs off when it was embedded in a node.
    pub fn parent_endpoint(&self) -> Option<&str> {
        self.parent_endpoint.as_deref()
    }

    /// The opaque cursor for the page after this one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor(PagingDirection::Next)
    }

    /// The opaque cursor for the page before this one.
    pub fn previous_cursor(&self) -> Option<&str> {
        self.cursor(PagingDirection::Previous)
    }

    /// The cursor in the given direction, at `paging.cursors.{after,before}`.
    pub fn cursor(&self, direction: PagingDirection) -> Option<&str> {
        self.meta
            .get("paging")
            .and_then(|paging| paging.get("cursors"))
            .and_then(|cursors| cursors.get(direction.cursor_key()))
            .and_then(Value::as_str)
    }

    /// The collection's total size, when the call requested
    /// `summary=total_count`. Never inferred from the page itself.
    pub fn total_count(&self) -> Option<i64> {
        self.meta
            .get("summary")
            .and_then(|summary| summary.get("total_count"))
            .and_then(crate::error::int_value)
    }

    /// The relative URL of the adjacent page, host stripped.
    ///
    /// Fails with [`Error::Pagination`] when the source request was not a
    /// `GET`; returns `Ok(None)` when the metadata has no page in that
    /// direction.
    pub fn pagination_url(&self, direction: PagingDirection) -> Result<Option<String>, Error> {
        self.validate_for_pagination()?;

        let page_url = self
            .meta
            .get("paging")
            .and_then(|paging| paging.get(direction.page_key()))
            .and_then(Value::as_str);

        Ok(page_url.map(strip_host))
    }

    /// Clones the source request against the adjacent page's URL.
    ///
    /// Returns `Ok(None)` when there is no page in that direction.
    pub fn pagination_request(
        &self,
        direction: PagingDirection,
    ) -> Result<Option<GraphRequest>, Error> {
        let url = match self.pagination_url(direction)? {
            Some(url) => url,
            None => return Ok(None),
        };

        let mut request = self.request.clone();
        request.set_endpoint(url);
        Ok(Some(request))
    }

    /// Shorthand for [`pagination_request`](Self::pagination_request) in the
    /// [`Next`](PagingDirection::Next) direction.
    pub fn next_page_request(&self) -> Result<Option<GraphRequest>, Error> {
        self.pagination_request(PagingDirection::Next)
    }

    /// Shorthand for [`pagination_request`](Self::pagination_request) in the
    /// [`Previous`](PagingDirection::Previous) direction.
    pub fn previous_page_request(&self) -> Result<Option<GraphRequest>, Error> {
        self.pagination_request(PagingDirection::Previous)
    }

    fn validate_for_pagination(&self) -> Result<(), Error> {
        if self.request.method() == Method::Get {
            Ok(())
        } else {
            Err(Error::Pagination)
        }
    }
}

/// Reduces an absolute paging URL to its path and query. The client
/// re-prefixes its own base URL when the follow-up request is sent.
fn strip_host(page_url: &str) -> String {
    match url::Url::parse(page_url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_owned(),
        },
        // Not absolute; force the leading slash and use it as-is.
        Err(_) => {
            if page_url.starts_with('/') {
                page_url.to_owned()
            } else {
                format!("/{page_url}")
            }
        }
    }
}
