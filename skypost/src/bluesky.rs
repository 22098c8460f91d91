#![doc = "Bluesky publisher: implements the core `Publisher` trait over AT Protocol XRPC calls."]
//
//! # Bluesky integration (CLI <-> Core)
//!
//! This module bridges [`skypost_core::contract::Publisher`] to a real Bluesky account.
//!
//! - Construct credentials with [`BlueskyCredentials::from_env`] (`BLUESKY_USERNAME`,
//!   `BLUESKY_APP_PASSWORD`).
//! - [`BlueskyClient::login`] opens a session (`com.atproto.server.createSession`).
//! - Posts are written as `app.bsky.feed.post` records with
//!   `com.atproto.repo.createRecord`; images and card thumbnails are uploaded first with
//!   `com.atproto.repo.uploadBlob`.

use std::env;
use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use skypost_core::contract::{LinkCard, PublishError, Publisher};
use skypost_core::imaging::mime_type;

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const USERNAME_VAR: &str = "BLUESKY_USERNAME";
pub const APP_PASSWORD_VAR: &str = "BLUESKY_APP_PASSWORD";

const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Account handle (or DID / email) and app password.
pub struct BlueskyCredentials {
    pub identifier: String,
    pub app_password: String,
}

impl fmt::Debug for BlueskyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyCredentials")
            .field("identifier", &self.identifier)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

impl BlueskyCredentials {
    pub fn from_env() -> Result<Self> {
        match (env::var(USERNAME_VAR), env::var(APP_PASSWORD_VAR)) {
            (Ok(identifier), Ok(app_password)) => {
                tracing::info!(identifier = %identifier, "Loaded Bluesky credentials from environment");
                Ok(Self {
                    identifier,
                    app_password,
                })
            }
            (username, password) => {
                tracing::error!(
                    username_set = username.is_ok(),
                    password_set = password.is_ok(),
                    "Bluesky credentials missing in environment"
                );
                anyhow::bail!(
                    "{USERNAME_VAR} and/or {APP_PASSWORD_VAR} environment variables are not set."
                )
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

/// An authenticated Bluesky session.
pub struct BlueskyClient {
    http: Client,
    service: String,
    session: Session,
}

impl BlueskyClient {
    /// Logs in against `service` (e.g. `https://bsky.social`).
    pub async fn login(service: &str, credentials: &BlueskyCredentials) -> Result<Self> {
        let http = Client::new();
        let service = service.trim_end_matches('/').to_string();
        let url = format!("{service}/xrpc/com.atproto.server.createSession");

        tracing::info!(service = %service, identifier = %credentials.identifier, "Logging in to Bluesky");
        let response = http
            .post(&url)
            .json(&json!({
                "identifier": credentials.identifier,
                "password": credentials.app_password,
            }))
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Bluesky login rejected");
            anyhow::bail!("Bluesky login failed with {status}: {body}");
        }

        let session: Session = response
            .json()
            .await
            .context("Failed to decode Bluesky session")?;
        tracing::info!(did = %session.did, "Bluesky session created");

        Ok(Self {
            http,
            service,
            session,
        })
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.service)
    }

    async fn upload_blob(&self, data: &[u8]) -> Result<Value, PublishError> {
        let mime = mime_type(data).unwrap_or("application/octet-stream");
        tracing::info!(size = data.len(), mime, "Uploading blob");

        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&self.session.access_jwt)
            .header(CONTENT_TYPE, mime)
            .body(data.to_vec())
            .send()
            .await?;
        let body = checked_json(response, "com.atproto.repo.uploadBlob").await?;

        body.get("blob")
            .cloned()
            .ok_or_else(|| "uploadBlob response has no `blob` field".into())
    }

    async fn create_post(&self, text: &str, embed: Option<Value>) -> Result<(), PublishError> {
        let mut record = json!({
            "$type": POST_COLLECTION,
            "text": text,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let Some(embed) = embed {
            record["embed"] = embed;
        }

        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&self.session.access_jwt)
            .json(&json!({
                "repo": self.session.did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .send()
            .await?;
        let created = checked_json(response, "com.atproto.repo.createRecord").await?;

        let uri = created.get("uri").and_then(Value::as_str).unwrap_or_default();
        tracing::info!(uri, "Created post record");
        Ok(())
    }
}

async fn checked_json(response: reqwest::Response, method: &str) -> Result<Value, PublishError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(method, status = %status, body = %body, "XRPC request rejected");
        return Err(format!("{method} returned {status}: {body}").into());
    }
    Ok(response.json().await?)
}

#[async_trait]
impl Publisher for BlueskyClient {
    async fn send_post(&self, text: &str) -> Result<(), PublishError> {
        self.create_post(text, None).await
    }

    async fn send_image(&self, text: &str, image: &[u8], alt: &str) -> Result<(), PublishError> {
        let blob = self.upload_blob(image).await?;
        let embed = json!({
            "$type": "app.bsky.embed.images",
            "images": [{ "alt": alt, "image": blob }],
        });
        self.create_post(text, Some(embed)).await
    }

    async fn send_card(
        &self,
        text: &str,
        thumb: &[u8],
        card: &LinkCard,
    ) -> Result<(), PublishError> {
        let blob = self.upload_blob(thumb).await?;
        let embed = json!({
            "$type": "app.bsky.embed.external",
            "external": {
                "uri": card.uri,
                "title": card.title,
                "description": card.description,
                "thumb": blob,
            },
        });
        self.create_post(text, Some(embed)).await
    }
}
