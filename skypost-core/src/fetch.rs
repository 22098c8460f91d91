use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use crate::contract::{FetchedImage, ImageFetcher, PipelineError};

/// Downloads images referenced by absolute URLs in post front matter.
#[derive(Default)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, PipelineError> {
        info!(url = %url, "Fetching remote image");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to fetch image");
            PipelineError::Fetch(format!("Failed to download image from {url}: {e}"))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            error!(error = ?e, url = %url, status = %status, "Failed to read image response body");
            PipelineError::Fetch(format!("Failed to read image body from {url}: {e}"))
        })?;

        info!(url = %url, status = %status, size = body.len(), "Fetched remote image");
        Ok(FetchedImage {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}
