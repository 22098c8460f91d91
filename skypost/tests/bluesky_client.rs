use serde_json::{json, Value};
use skypost::bluesky::{BlueskyClient, BlueskyCredentials};
use skypost_core::contract::{LinkCard, Publisher};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n rest of image";

fn credentials() -> BlueskyCredentials {
    BlueskyCredentials {
        identifier: "poster.bsky.social".into(),
        app_password: "app-pass".into(),
    }
}

async fn server_with_session() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .and(body_partial_json(json!({
            "identifier": "poster.bsky.social",
            "password": "app-pass",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessJwt": "access-token",
            "refreshJwt": "refresh-token",
            "did": "did:plc:poster",
            "handle": "poster.bsky.social",
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn mount_create_record(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .and(header("authorization", "Bearer access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:poster/app.bsky.feed.post/3k",
            "cid": "bafyrecord",
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_upload_blob(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blob": {
                "$type": "blob",
                "ref": { "$link": "bafyblob" },
                "mimeType": "image/png",
                "size": PNG_MAGIC.len(),
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn created_record(server: &MockServer) -> Value {
    let requests: Vec<Request> = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .find(|r| r.url.path() == "/xrpc/com.atproto.repo.createRecord")
        .expect("createRecord was called");
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn text_post_creates_a_feed_record() {
    let server = server_with_session().await;
    mount_create_record(&server).await;

    let client = BlueskyClient::login(&server.uri(), &credentials()).await.unwrap();
    client.send_post("Hello world").await.unwrap();

    let body = created_record(&server).await;
    assert_eq!(body["repo"], "did:plc:poster");
    assert_eq!(body["collection"], "app.bsky.feed.post");
    assert_eq!(body["record"]["$type"], "app.bsky.feed.post");
    assert_eq!(body["record"]["text"], "Hello world");
    assert!(body["record"]["createdAt"].as_str().unwrap().ends_with('Z'));
    assert!(body["record"].get("embed").is_none());
}

#[tokio::test]
async fn image_post_uploads_blob_then_embeds_it_with_alt_text() {
    let server = server_with_session().await;
    mount_upload_blob(&server).await;
    mount_create_record(&server).await;

    let client = BlueskyClient::login(&server.uri(), &credentials()).await.unwrap();
    client.send_image("Look", PNG_MAGIC, "a cat").await.unwrap();

    let embed = &created_record(&server).await["record"]["embed"];
    assert_eq!(embed["$type"], "app.bsky.embed.images");
    assert_eq!(embed["images"][0]["alt"], "a cat");
    assert_eq!(embed["images"][0]["image"]["ref"]["$link"], "bafyblob");
}

#[tokio::test]
async fn card_post_embeds_external_link_with_thumbnail() {
    let server = server_with_session().await;
    mount_upload_blob(&server).await;
    mount_create_record(&server).await;

    let client = BlueskyClient::login(&server.uri(), &credentials()).await.unwrap();
    let card = LinkCard {
        title: "Example".into(),
        description: "An example site".into(),
        uri: "https://example.com".into(),
    };
    client.send_card("Read this", PNG_MAGIC, &card).await.unwrap();

    let embed = &created_record(&server).await["record"]["embed"];
    assert_eq!(embed["$type"], "app.bsky.embed.external");
    assert_eq!(embed["external"]["uri"], "https://example.com");
    assert_eq!(embed["external"]["title"], "Example");
    assert_eq!(embed["external"]["description"], "An example site");
    assert_eq!(embed["external"]["thumb"]["ref"]["$link"], "bafyblob");
}

#[tokio::test]
async fn rejected_record_is_an_error() {
    let server = server_with_session().await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "InvalidRequest",
            "message": "Record/text must not be longer than 300 graphemes",
        })))
        .mount(&server)
        .await;

    let client = BlueskyClient::login(&server.uri(), &credentials()).await.unwrap();
    let err = client.send_post("too long").await.unwrap_err();
    assert!(err.to_string().contains("400"), "got: {err}");
}

#[tokio::test]
async fn rejected_login_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "AuthenticationRequired",
            "message": "Invalid identifier or password",
        })))
        .mount(&server)
        .await;

    let err = BlueskyClient::login(&server.uri(), &credentials())
        .await
        .err()
        .expect("login should fail");
    assert!(err.to_string().contains("401"), "got: {err}");
}
