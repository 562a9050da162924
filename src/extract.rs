//! Extracción de texto de cotizaciones en PDF con `pdf-extract`.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::quotes::{ExtractedText, FetchedDocument, TextExtractor};

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

pub fn is_pdf(document: &FetchedDocument) -> bool {
    document.content_type.to_lowercase().contains("pdf") || document.bytes.starts_with(b"%PDF")
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, document: &FetchedDocument) -> Result<ExtractedText> {
        if !is_pdf(document) {
            bail!("Tipo de contenido sin texto extraíble: {}", document.content_type);
        }

        // pdf-extract es síncrono y puede entrar en pánico con PDFs corruptos.
        let bytes = document.bytes.clone();
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
                .map_err(|e| anyhow!("No se pudo extraer texto del PDF: {e}"))
        })
        .await
        .map_err(|e| anyhow!("La extracción del PDF se interrumpió: {e}"))??;

        Ok(ExtractedText {
            num_pages: pages.len(),
            text: pages.join("\n\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn detects_pdf_by_type_or_magic() {
        let by_type = FetchedDocument {
            bytes: Vec::new(),
            content_type: "application/PDF".into(),
        };
        let by_magic = FetchedDocument {
            bytes: b"%PDF-1.7 ...".to_vec(),
            content_type: "application/octet-stream".into(),
        };
        let image = FetchedDocument {
            bytes: vec![0x89, b'P', b'N', b'G'],
            content_type: "image/png".into(),
        };
        assert!(is_pdf(&by_type));
        assert!(is_pdf(&by_magic));
        assert!(!is_pdf(&image));
    }

    #[tokio::test]
    async fn images_signal_vision_fallback() {
        let image = FetchedDocument {
            bytes: vec![0xFF, 0xD8, 0xFF],
            content_type: "image/jpeg".into(),
        };
        assert_err!(PdfTextExtractor.extract(&image).await);
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_error_not_a_panic() {
        let broken = FetchedDocument {
            bytes: b"%PDF-1.4 this is not really a pdf".to_vec(),
            content_type: "application/pdf".into(),
        };
        assert_err!(PdfTextExtractor.extract(&broken).await);
    }
}
