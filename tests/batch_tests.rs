mod common;

use common::*;
use instagram_graph_rs::{Error, ErrorKind, FileAttachment, GraphRequest};
use serde_json::{json, Map};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_batch_round_trip_by_name() {
    let server = MockServer::start().await;

    // Arrange
    let client = test_client(&server);

    // The batch API responds with an array of objects. Each object's
    // 'body' field is a JSON *string*, so we must serialize it first.
    let batch_reply = json!([
        {
            "code": 200,
            "headers": [
                { "name": "ETag", "value": "\"profile.v7\"" },
                { "name": "Content-Type", "value": "application/json" }
            ],
            "body": json!({
                "id": "17841405793187218",
                "username": "jayposiris"
            }).to_string()
        },
        {
            "code": 200,
            "headers": [],
            "body": json!({
                "data": [{ "id": "media.1" }, { "id": "media.2" }]
            }).to_string()
        }
    ]);

    Mock::given(method("POST"))
        .and(path("/v8.0"))
        .and(form_param("include_headers", "true"))
        .and(form_param("access_token", ACCESS_TOKEN))
        // Verify both sub-requests are in the serialized batch payload.
        .and(form_value_contains(r#""name":"profile""#))
        .and(form_value_contains(r#""relative_url":"/v8.0/me?"#))
        .and(form_value_contains(r#""relative_url":"/v8.0/me/media?"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(batch_reply))
        .expect(1)
        .mount(&server)
        .await;

    let mut batch = client.new_batch();
    batch
        .add_named("profile", GraphRequest::get("me").param("fields", "id,username"))
        .unwrap()
        .add_named("media", GraphRequest::get("me/media").param("fields", "id"))
        .unwrap();

    // Act
    let responses = client.send_batch(&batch).await.unwrap();

    // Assert
    assert_eq!(responses.len(), 2);
    assert!(!responses.envelope().is_error());

    let profile = responses.get("profile").unwrap();
    assert_eq!(profile.http_status(), 200);
    assert_eq!(profile.etag(), Some("\"profile.v7\""));
    assert_eq!(
        profile.decoded_body().get("username"),
        Some(&json!("jayposiris"))
    );

    let media = responses.get("media").unwrap();
    let items = media.decoded_body().get("data").unwrap();
    assert_eq!(items.as_array().map(Vec::len), Some(2));

    // Members are also addressable by position.
    assert_eq!(
        responses.get_index(0).map(|r| r.http_status()),
        Some(200)
    );
    assert!(responses.get("missing").is_none());
}

#[tokio::test]
async fn test_batch_member_failures_stay_isolated() {
    let server = MockServer::start().await;

    // Arrange
    let client = test_client(&server);

    let batch_reply = json!([
        {
            "code": 200,
            "headers": [],
            "body": json!({ "id": "17841405793187218" }).to_string()
        },
        {
            "code": 400,
            "headers": [],
            "body": json!({
                "error": {
                    "message": "Invalid OAuth access token.",
                    "type": "OAuthException",
                    "code": 190
                }
            }).to_string()
        }
    ]);

    Mock::given(method("POST"))
        .and(path("/v8.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(batch_reply))
        .expect(1)
        .mount(&server)
        .await;

    let mut batch = client.new_batch();
    batch
        .add_named("good", GraphRequest::get("me"))
        .unwrap()
        .add_named(
            "bad",
            GraphRequest::get("me").access_token("not-a-real-token"),
        )
        .unwrap();

    // Act
    let responses = client.send_batch(&batch).await.unwrap();

    // Assert: the failed member classifies, the sibling is untouched.
    let bad = responses.get("bad").unwrap();
    assert!(bad.is_error());
    let graph = bad.error().unwrap();
    assert_eq!(graph.kind(), &ErrorKind::Authentication);
    assert_eq!(graph.code(), Some(190));
    assert_eq!(graph.http_status(), 400);

    let good = responses.get("good").unwrap();
    assert!(!good.is_error());
    assert_eq!(
        good.decoded_body().get("id"),
        Some(&json!("17841405793187218"))
    );
}

#[tokio::test]
async fn test_batch_files_lift_to_the_envelope() {
    let server = MockServer::start().await;

    // Arrange
    let client = test_client(&server);

    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0; 32]);

    // With files attached the envelope goes out as multipart, carrying the
    // batch JSON raw, so its fragments are matchable directly.
    Mock::given(method("POST"))
        .and(path("/v8.0"))
        .and(body_string_contains("name=\"batch\""))
        .and(body_string_contains(r#""attached_files":"file0""#))
        .and(body_string_contains(r#""omit_response_on_success":true"#))
        .and(body_string_contains(
            "Content-Disposition: form-data; name=\"file0\"; filename=\"photo.png\"",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([null])))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = Map::new();
    options.insert("omit_response_on_success".to_owned(), json!(true));

    let mut batch = client.new_batch();
    batch
        .add_with_options(
            Some("upload".to_owned()),
            GraphRequest::post("me/media").file(FileAttachment::new("source", "photo.png", png)),
            options,
        )
        .unwrap();

    // Act
    let responses = client.send_batch(&batch).await.unwrap();

    // Assert: a null member entry normalizes to an empty 200.
    let upload = responses.get("upload").unwrap();
    assert_eq!(upload.http_status(), 200);
    assert!(!upload.is_error());
    assert!(upload.body().is_empty());
}

#[tokio::test]
async fn test_oversized_and_empty_batches_are_rejected() {
    let server = MockServer::start().await;

    // Arrange: no mock mounted; nothing must reach the wire.
    let client = test_client(&server);

    let mut oversized = client.new_batch();
    oversized
        .add_all((0..51).map(|i| (format!("n{i}"), GraphRequest::get(format!("node/{i}")))))
        .unwrap();

    // Act
    let too_big = client.send_batch(&oversized).await.unwrap_err();
    let empty = client.send_batch(&client.new_batch()).await.unwrap_err();

    // Assert
    assert!(matches!(too_big, Error::BatchSize(51)));
    assert!(matches!(empty, Error::BatchSize(0)));
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(0));
}
