mod support;

use pretty_assertions::assert_eq;
use saraia::repaint::prompt::ROLE_LINE;
use saraia::{
    ImageRepaintClient, PartSelection, RepaintError, RepaintProvider, RepaintRequest, SourceImage,
};
use serde_json::json;
use std::time::Duration;
use support::{closed_base_url, success_body, CannedReply, FixtureServer, GENERATE_TARGET};

/// Base64 of a 1x1 transparent PNG.
const ONE_PIXEL_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn photo() -> SourceImage {
    SourceImage::from_base64(ONE_PIXEL_PNG)
}

fn malformed_path(err: RepaintError) -> String {
    match err {
        RepaintError::MalformedResponse { path, .. } => path,
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn repaint_wall_and_ceiling_end_to_end() {
    let server = FixtureServer::start(200, success_body("Zm9v")).await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let image = client
        .repaint(photo(), [("wall", "#FFAA00"), ("ceiling", "white")])
        .await
        .unwrap();

    assert_eq!(image.data, "Zm9v");
    assert_eq!(image.mime_type.as_deref(), Some("image/png"));
    assert_eq!(image.metadata.model.as_deref(), Some("gemini-2.5-flash-image"));
    assert_eq!(image.decode().unwrap(), b"foo");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].target, GENERATE_TARGET);

    let text = format!("{ROLE_LINE}\n- WALL: Color #FFAA00\n- CEILING: Color white\n");
    assert_eq!(
        requests[0].body,
        json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": ONE_PIXEL_PNG } },
                    { "text": text }
                ]
            }]
        })
    );
}

#[tokio::test]
async fn empty_directives_send_role_line_only() {
    let server = FixtureServer::start(200, success_body("Zm9v")).await;
    let provider = server.provider();

    let request = RepaintRequest::new(photo(), Vec::<(String, String)>::new());
    provider.repaint(&request).await.unwrap();

    let requests = server.requests();
    assert_eq!(
        requests[0].body["contents"][0]["parts"][1]["text"],
        json!(format!("{ROLE_LINE}\n"))
    );
}

#[tokio::test]
async fn not_found_is_a_server_error() {
    let server = FixtureServer::start(404, r#"{"error":{"code":404}}"#).await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let err = client.repaint(photo(), [("wall", "red")]).await.unwrap_err();
    assert!(matches!(err, RepaintError::Server { status: 404 }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn failures_are_not_retried() {
    let server = FixtureServer::start_sequence(vec![
        CannedReply::new(503, ""),
        CannedReply::new(200, success_body("YmFy")),
    ])
    .await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let first = client.repaint(photo(), [("wall", "red")]);
    let second = client.repaint(photo(), [("wall", "blue")]);

    let err = first.await.unwrap_err();
    assert!(matches!(err, RepaintError::Server { status: 503 }));
    assert!(err.is_retryable());
    assert_eq!(second.await.unwrap().data, "YmFy");
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn missing_candidates_is_malformed() {
    let server = FixtureServer::start(200, r#"{"modelVersion":"gemini-2.5-flash-image"}"#).await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let err = client.repaint(photo(), [("wall", "red")]).await.unwrap_err();
    assert_eq!(malformed_path(err), "candidates");
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = FixtureServer::start(200, "<html>gateway</html>").await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let err = client.repaint(photo(), [("wall", "red")]).await.unwrap_err();
    assert_eq!(malformed_path(err), "$");
}

#[tokio::test]
async fn text_before_image_needs_scanning() {
    let body = json!({
        "candidates": [{
            "content": {
                "parts": [
                    { "text": "Aquí tens la teva sala" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "YmF6" } }
                ]
            }
        }]
    })
    .to_string();
    let server = FixtureServer::start(200, body).await;

    let strict = server.provider();
    let request = RepaintRequest::new(photo(), [("wall", "red")]);
    let err = strict.repaint(&request).await.unwrap_err();
    assert_eq!(malformed_path(err), "candidates[0].content.parts[0].inlineData");

    let scanning = server
        .provider_builder()
        .part_selection(PartSelection::FirstImage)
        .build()
        .unwrap();
    let image = scanning.repaint(&request).await.unwrap();
    assert_eq!(image.data, "YmF6");
    assert_eq!(image.format(), saraia::ImageFormat::Jpeg);
}

#[tokio::test]
async fn blocked_prompt_is_malformed_with_reason() {
    let body = json!({ "promptFeedback": { "blockReason": "OTHER" } }).to_string();
    let server = FixtureServer::start(200, body).await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let err = client.repaint(photo(), [("wall", "red")]).await.unwrap_err();
    match err {
        RepaintError::MalformedResponse { path, detail } => {
            assert_eq!(path, "candidates");
            assert_eq!(detail, "prompt blocked: OTHER");
        }
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_a_connection_error() {
    support::bypass_proxies();
    let provider = saraia::GeminiProvider::builder()
        .api_key(support::TEST_KEY)
        .base_url(closed_base_url().await)
        .build()
        .unwrap();
    let client = ImageRepaintClient::new(provider).unwrap();

    let err = client.repaint(photo(), [("wall", "red")]).await.unwrap_err();
    assert!(matches!(err, RepaintError::Connection(_)), "got {err:?}");
    assert!(!err.to_string().contains(support::TEST_KEY));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = FixtureServer::start_sequence(vec![
        CannedReply::new(200, success_body("Zm9v")).delayed(Duration::from_secs(3)),
    ])
    .await;
    let provider = server
        .provider_builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let client = ImageRepaintClient::new(provider).unwrap();

    let err = client.repaint(photo(), [("wall", "red")]).await.unwrap_err();
    assert!(matches!(err, RepaintError::Connection(_)), "got {err:?}");
}

#[tokio::test]
async fn empty_image_never_reaches_the_network() {
    let server = FixtureServer::start(200, success_body("Zm9v")).await;
    let client = ImageRepaintClient::new(server.provider()).unwrap();

    let err = client
        .repaint(SourceImage::from_base64(""), [("wall", "red")])
        .await
        .unwrap_err();
    assert!(matches!(err, RepaintError::InvalidRequest(_)));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn health_check_maps_statuses() {
    let ok = FixtureServer::start(200, r#"{"name":"models/gemini-2.5-flash-image"}"#).await;
    ok.provider().health_check().await.unwrap();
    let requests = ok.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(
        requests[0].target,
        "/v1beta/models/gemini-2.5-flash-image?key=test-key"
    );

    let forbidden = FixtureServer::start(403, "{}").await;
    let err = forbidden.provider().health_check().await.unwrap_err();
    assert!(matches!(err, RepaintError::Auth(_)));

    let unavailable = FixtureServer::start(503, "{}").await;
    let err = unavailable.provider().health_check().await.unwrap_err();
    assert!(matches!(err, RepaintError::Server { status: 503 }));
}
