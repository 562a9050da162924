//! Descarga de los binarios de cotización (`http(s)://` y `file://`).

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use mime_guess::MimeGuess;
use tracing::debug;
use url::Url;

use crate::quotes::{DocumentFetcher, FetchedDocument};

#[derive(Debug, Clone)]
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

/// Usa la cabecera si es útil; si no, adivina por la extensión de la URL.
pub fn content_type_for(url: &Url, header: Option<&str>) -> String {
    match header.map(str::trim) {
        Some(ct) if !ct.is_empty() && !ct.starts_with("application/octet-stream") => {
            ct.to_string()
        }
        _ => MimeGuess::from_path(url.path())
            .first_or_octet_stream()
            .to_string(),
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, raw_url: &str) -> Result<FetchedDocument> {
        let url = Url::parse(raw_url.trim())
            .map_err(|e| anyhow!("fileUrl inválida '{raw_url}': {e}"))?;

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| anyhow!("Ruta de fichero inválida: {url}"))?;
                let bytes = tokio::fs::read(&path).await?;
                debug!("Leído {} ({} bytes)", path.display(), bytes.len());
                Ok(FetchedDocument {
                    content_type: content_type_for(&url, None),
                    bytes,
                })
            }
            "http" | "https" => {
                let response = self.client.get(url.clone()).send().await?.error_for_status()?;
                let header = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await?.to_vec();
                debug!("Descargado {url} ({} bytes)", bytes.len());
                Ok(FetchedDocument {
                    content_type: content_type_for(&url, header.as_deref()),
                    bytes,
                })
            }
            other => bail!("Esquema de URL no soportado: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn content_type_prefers_meaningful_header() {
        let url = Url::parse("https://storage.example.com/quotes/acme.pdf?token=1").unwrap();
        assert_eq!(content_type_for(&url, Some("image/png")), "image/png");
        assert_eq!(
            content_type_for(&url, Some("application/octet-stream")),
            "application/pdf"
        );
        assert_eq!(content_type_for(&url, None), "application/pdf");

        let unknown = Url::parse("https://storage.example.com/blob").unwrap();
        assert_eq!(content_type_for(&unknown, None), "application/octet-stream");
    }

    #[tokio::test]
    async fn reads_file_urls() {
        let path = std::env::temp_dir().join(format!("quote-{}.pdf", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let fetcher = HttpDocumentFetcher::new(5).unwrap();
        let doc = fetcher.fetch(url.as_str()).await.unwrap();
        assert_eq!(doc.bytes, b"%PDF-1.4");
        assert_eq!(doc.content_type, "application/pdf");
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn rejects_bad_urls() {
        let fetcher = HttpDocumentFetcher::new(5).unwrap();
        assert_err!(fetcher.fetch("not a url").await);
        assert_err!(fetcher.fetch("ftp://example.com/q.pdf").await);
        assert_err!(fetcher.fetch("file:///definitely/missing/quote.pdf").await);
    }
}
