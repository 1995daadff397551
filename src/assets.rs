use crate::ReportConfig;
use crate::error::{FetchTransportError, ReportError};
use crate::font::FontRegistry;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<FetchResponse, FetchTransportError>;
}

// Storage path to a short-lived fetchable URL.
#[async_trait]
pub trait StorageResolver: Send + Sync {
    async fn signed_url(&self, storage_path: &str) -> Result<String, FetchTransportError>;
}

#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Option<String>,
}

#[cfg(feature = "http")]
impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: None,
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    // Absolute URLs pass through untouched.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn resolve(&self, locator: &str) -> String {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return locator.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                locator.trim_start_matches('/')
            ),
            None => locator.to_string(),
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<FetchResponse, FetchTransportError> {
        let url = self.resolve(locator);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchTransportError(format!("request to {url} failed: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchTransportError(format!("reading body from {url} failed: {e}")))?;
        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}

// Missing files answer 404.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, locator: &str) -> Option<PathBuf> {
        let relative = Path::new(locator.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl Fetcher for FsFetcher {
    async fn fetch(&self, locator: &str) -> Result<FetchResponse, FetchTransportError> {
        let Some(path) = self.resolve(locator) else {
            return Ok(FetchResponse {
                status: 404,
                body: Vec::new(),
            });
        };
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(FetchResponse::ok(body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FetchResponse {
                status: 404,
                body: Vec::new(),
            }),
            Err(err) => Err(FetchTransportError(format!(
                "read {} failed: {err}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticStorageResolver {
    prefix: String,
}

impl StaticStorageResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl StorageResolver for StaticStorageResolver {
    async fn signed_url(&self, storage_path: &str) -> Result<String, FetchTransportError> {
        if storage_path.trim().is_empty() {
            return Err(FetchTransportError("empty storage path".to_string()));
        }
        if self.prefix.is_empty() {
            return Ok(storage_path.to_string());
        }
        Ok(format!(
            "{}/{}",
            self.prefix.trim_end_matches('/'),
            storage_path.trim_start_matches('/')
        ))
    }
}

#[derive(Debug, Clone)]
pub struct FontAssets {
    pub regular: Vec<u8>,
    pub bold: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TemplateAssets {
    pub base_document: Vec<u8>,
    pub fonts: FontAssets,
    pub base_sha256: String,
    pub(crate) registry: FontRegistry,
}

impl TemplateAssets {
    pub fn new(base_document: Vec<u8>, fonts: FontAssets) -> Self {
        let base_sha256 = sha256_hex(&base_document);
        let registry = FontRegistry::from_assets(&fonts);
        Self {
            base_document,
            fonts,
            base_sha256,
            registry,
        }
    }

    pub fn bytes_len(&self) -> usize {
        self.base_document.len() + self.fonts.regular.len() + self.fonts.bold.len()
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

async fn fetch_asset(fetcher: &dyn Fetcher, resource: &str) -> Result<Vec<u8>, ReportError> {
    let response = fetcher
        .fetch(resource)
        .await
        .map_err(|err| ReportError::TemplateLoad {
            resource: resource.to_string(),
            status: None,
            message: err.0,
        })?;
    if !response.is_success() {
        return Err(ReportError::TemplateLoad {
            resource: resource.to_string(),
            status: Some(response.status),
            message: "non-success response".to_string(),
        });
    }
    Ok(response.body)
}

// A failed load stores nothing. The lock is held across a load so concurrent first
// callers share one fetch.
#[derive(Debug, Default)]
pub struct TemplateCache {
    slot: Mutex<Option<Arc<TemplateAssets>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load(
        &self,
        fetcher: &dyn Fetcher,
        config: &ReportConfig,
    ) -> Result<Arc<TemplateAssets>, ReportError> {
        let mut slot = self.slot.lock().await;
        if let Some(assets) = slot.as_ref() {
            tracing::debug!(sha256 = %assets.base_sha256, "template cache hit");
            return Ok(Arc::clone(assets));
        }

        let (base_document, regular, bold) = tokio::try_join!(
            fetch_asset(fetcher, &config.base_document_path),
            fetch_asset(fetcher, &config.regular_font_path),
            fetch_asset(fetcher, &config.bold_font_path),
        )?;
        let assets = Arc::new(TemplateAssets::new(
            base_document,
            FontAssets { regular, bold },
        ));
        tracing::info!(
            base_document = %config.base_document_path,
            sha256 = %assets.base_sha256,
            bytes = assets.bytes_len(),
            "template assets loaded"
        );
        *slot = Some(Arc::clone(&assets));
        Ok(assets)
    }

    pub async fn clear(&self) {
        self.slot.lock().await.take();
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
