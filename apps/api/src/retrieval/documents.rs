//! Fetches the text behind an opportunity's document references.
//! A reference is either an http(s) URL or an object-storage key.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::errors::AppError;
use crate::storage::FileStore;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_text(&self, reference: &str) -> Result<String, AppError>;
}

pub struct DocumentLoader {
    http: Client,
    files: Arc<dyn FileStore>,
}

impl DocumentLoader {
    pub fn new(files: Arc<dyn FileStore>) -> anyhow::Result<Self> {
        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            files,
        })
    }

    async fn fetch_bytes(&self, reference: &str) -> Result<Bytes, AppError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let response = self
                .http
                .get(reference)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| AppError::Retrieval(format!("Fetching {reference} failed: {e}")))?;
            response
                .bytes()
                .await
                .map_err(|e| AppError::Retrieval(format!("Reading {reference} failed: {e}")))
        } else {
            self.files.get(reference).await
        }
    }
}

#[async_trait]
impl DocumentSource for DocumentLoader {
    async fn fetch_text(&self, reference: &str) -> Result<String, AppError> {
        let bytes = self.fetch_bytes(reference).await?;
        debug!("Fetched {} bytes for document {reference}", bytes.len());

        if is_pdf(reference, &bytes) {
            // PDF parsing is CPU-bound.
            let reference = reference.to_string();
            return tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| AppError::Retrieval(format!("PDF {reference} unreadable: {e}")))
            })
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in PDF extraction: {e}")))?;
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn is_pdf(reference: &str, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
        || reference
            .split(['?', '#'])
            .next()
            .is_some_and(|path| path.to_ascii_lowercase().ends_with(".pdf"))
}
