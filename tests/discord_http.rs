//! Discord REST adapter behavior against a mock API server.

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use embedfix::chat::{ChatGateway, DiscordGateway, MessageRef};
use embedfix::error::GatewayError;

fn gateway(server: &MockServer) -> DiscordGateway {
    DiscordGateway::with_api_base("test-token", server.uri())
}

#[tokio::test]
async fn post_reply_references_origin_and_returns_new_handle() {
    let server = MockServer::start().await;

    let expected_body = json!({
        "content": "https://fxtwitter.com/a/status/1",
        "message_reference": { "message_id": "555" },
        "allowed_mentions": { "replied_user": false },
    });

    Mock::given(method("POST"))
        .and(path("/channels/42/messages"))
        .and(header("authorization", "Bot test-token"))
        .and(body_json(expected_body))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "777", "channel_id": "42" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let origin = MessageRef::new("42", "555");
    let created = gateway(&server)
        .post_reply(&origin, "https://fxtwitter.com/a/status/1", false)
        .await
        .unwrap();

    assert_eq!(created, MessageRef::new("42", "777"));
    server.verify().await;
}

#[tokio::test]
async fn post_reply_can_mention_the_author() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/channels/42/messages"))
        .and(body_partial_json(
            json!({ "allowed_mentions": { "replied_user": true } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "778" })))
        .expect(1)
        .mount(&server)
        .await;

    let origin = MessageRef::new("42", "555");
    gateway(&server)
        .post_reply(&origin, "content", true)
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn edit_patches_the_message_content() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/channels/42/messages/777"))
        .and(body_json(json!({ "content": "https://vxtwitter.com/a/status/1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "777" })))
        .expect(1)
        .mount(&server)
        .await;

    let message = MessageRef::new("42", "777");
    gateway(&server)
        .edit_message(&message, "https://vxtwitter.com/a/status/1")
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn has_preview_reports_embed_presence() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/channels/42/messages/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "1", "embeds": [{ "type": "link" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/42/messages/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "2", "embeds": [] })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    assert!(gateway.has_preview(&MessageRef::new("42", "1")).await.unwrap());
    assert!(!gateway.has_preview(&MessageRef::new("42", "2")).await.unwrap());
}

#[tokio::test]
async fn suppress_sets_the_suppress_embeds_flag() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/channels/42/messages/555"))
        .and(body_json(json!({ "flags": 4 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "555" })))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .suppress_previews(&MessageRef::new("42", "555"))
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn forbidden_maps_to_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/channels/42/messages/555"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({ "code": 50013, "message": "Missing Permissions" })),
        )
        .mount(&server)
        .await;

    let err = gateway(&server)
        .suppress_previews(&MessageRef::new("42", "555"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::PermissionDenied));
}

#[tokio::test]
async fn other_failures_carry_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/channels/42/messages/555"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Unknown Message" })),
        )
        .mount(&server)
        .await;

    let err = gateway(&server)
        .delete_message(&MessageRef::new("42", "555"))
        .await
        .unwrap_err();
    match err {
        GatewayError::Request { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("Unknown Message"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn rate_limited_requests_retry_after_the_told_delay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({ "message": "You are being rate limited." })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "1", "username": "embedfix" })),
        )
        .mount(&server)
        .await;

    let username = gateway(&server).current_user_name().await.unwrap();
    assert_eq!(username, "embedfix");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2, "one 429 and one retry");
}

#[tokio::test]
async fn command_registration_puts_the_full_set() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/applications/123/guilds/99/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let payloads = embedfix::commands::command_payloads();
    gateway(&server)
        .register_commands("123", Some("99"), &payloads)
        .await
        .unwrap();
    server.verify().await;
}
