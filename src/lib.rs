// #![deny(missing_docs)]
#![deny(clippy::future_not_send)]
#![deny(clippy::large_enum_variant)]

//! # instagram_graph_rs
//!
//! An async Rust client for the Instagram Graph API. This crate covers the
//! full request/response cycle: building authenticated requests, sending
//! them singly or batched through a pluggable transport, decoding the
//! heterogeneous bodies the API returns, classifying API-level errors into
//! a typed taxonomy, walking cursor-paginated collections, and running the
//! OAuth login and token-exchange flows.
//!
//! ## ✨ Features
//!
//! - **Requests**: `GET`/`POST`/`DELETE` with params, ETags, custom headers,
//!   and file attachments; the access token and HMAC app-secret proof are
//!   applied to every call automatically.
//! - **Batched Calls**: bundle up to 50 requests into one round-trip, name
//!   the sub-requests, and fan the reply back out into standalone,
//!   individually addressable responses.
//! - **Pagination**: cursor-based [`Edge`] walking, page by page or as a
//!   `TryStream` of nodes that fetches further pages on demand.
//! - **OAuth**: authorization URLs, code-for-token and short-for-long-lived
//!   exchanges, token-to-code round-trips, and a redirect login helper with
//!   CSRF state validation.
//! - **Typed Errors**: Graph error payloads are classified by code and
//!   subcode into authentication, authorization, throttling, server-error,
//!   and resumable-upload kinds, so callers can branch without
//!   string-matching.
//! - **Pluggable Transport**: a [`reqwest`]-backed transport ships by
//!   default; anything implementing [`Transport`] can stand in.
//!
//! ## 🚀 Examples
//!
//! ---
//!
//! ### Create a Client
//! ```rust,no_run
//! use instagram_graph_rs::Client;
//!
//! # fn create_client_example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .app("YOUR_APP_ID", "YOUR_APP_SECRET")
//!     .default_access_token("YOUR_ACCESS_TOKEN")
//!     .graph_version("v8.0")
//!     .build()?;
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Fetch a Node
//! ```rust,no_run
//! use instagram_graph_rs::Client;
//!
//! # async fn fetch_node_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let profile = client
//!     .get("me")
//!     .param("fields", "id,username,media_count")
//!     .await?;
//!
//! println!("profile: {}", profile.body());
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Publish a Post
//! ```rust,no_run
//! use instagram_graph_rs::Client;
//!
//! # async fn publish_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! // Stage the image, then publish the returned container.
//! let container = client
//!     .post("me/media")
//!     .param("image_url", "https://example.com/photo.jpg")
//!     .param("caption", "Hello from Rust!")
//!     .await?;
//!
//! if let Some(id) = container.decoded_body().get("id") {
//!     client
//!         .post("me/media_publish")
//!         .param("creation_id", id.as_str().unwrap_or_default())
//!         .await?;
//! }
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Batch Several Calls into One Round-Trip 🚀
//! ```rust,no_run
//! use instagram_graph_rs::{Client, GraphRequest};
//!
//! # async fn batch_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let mut batch = client.new_batch();
//! batch
//!     .add_named("profile", GraphRequest::get("me").param("fields", "id,username"))?
//!     .add_named("media", GraphRequest::get("me/media").param("fields", "id,caption"))?;
//!
//! let responses = client.send_batch(&batch).await?;
//!
//! if let Some(media) = responses.get("media") {
//!     println!("media: {}", media.body());
//! }
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Walk an Edge
//! ```rust,no_run
//! use futures::TryStreamExt as _;
//! use instagram_graph_rs::{Client, Edge};
//!
//! # async fn paginate_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let first = client
//!     .get("me/media")
//!     .param("fields", "id,caption")
//!     .await?;
//!
//! let mut media = client.paginate(Edge::from_response(&first)?);
//! while let Some(item) = media.try_next().await? {
//!     println!("media id: {:?}", item.get("id"));
//! }
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Log a User In
//! ```rust,no_run
//! use instagram_graph_rs::{Client, InMemoryStore};
//!
//! # async fn login_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let helper = client.login_helper(InMemoryStore::new());
//! let login_url =
//!     helper.login_url("https://example.com/callback", &["user_profile", "user_media"])?;
//! println!("Log in at: {login_url}");
//!
//! // ...the user signs in and Instagram redirects them back...
//! let redirect = "https://example.com/callback?code=AQD8H6...&state=...";
//! let short_lived = helper.access_token_from_redirect(redirect).await?;
//!
//! let long_lived = client.oauth().get_long_lived_access_token(&short_lived).await?;
//! println!("expires at {:?}", long_lived.expires_at());
//! # Ok(()) }
//! ```
//!
//! ---
//!
//! ### Branch on a Classified Error
//! ```rust,no_run
//! use instagram_graph_rs::{Client, Error, ErrorKind};
//!
//! # async fn error_example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! match client.get("me").await {
//!     Ok(profile) => println!("{}", profile.body()),
//!     Err(Error::Graph(graph)) if matches!(graph.kind(), ErrorKind::Throttled) => {
//!         eprintln!("rate limited, backing off: {}", graph.message());
//!     }
//!     Err(other) => return Err(other.into()),
//! }
//! # Ok(()) }
//! ```
//!
//! ---

pub mod auth;
pub mod batch;
pub mod client;
pub mod edge;
pub mod error;
pub mod login;
pub mod oauth;
pub mod request;
pub mod response;

pub use auth::{AccessToken, App};
pub use batch::{BatchRequest, BatchResponse};
pub use client::{Client, ClientBuilder, RawResponse, ReqwestTransport, Transport};
pub use edge::Edge;
pub use error::{Error, ErrorKind, GraphApiError};
pub use login::{InMemoryStore, PersistentDataStore, RedirectLoginHelper};
pub use oauth::OAuth2Client;
pub use request::{FileAttachment, GraphRequest, Method};
pub use response::GraphResponse;
