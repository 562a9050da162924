use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

use crate::config::AppConfig;
use crate::models::ParsedQuoteData;
use crate::quotes::QuoteCache;

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea los constraints de las etiquetas usadas:
/// :QuoteDocument (caché de cotizaciones extraídas).
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        // QuoteDocument.id único
        "CREATE CONSTRAINT quote_document_id IF NOT EXISTS
         FOR (q:QuoteDocument)
         REQUIRE q.id IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado.");
    Ok(())
}

/// URL del navegador de Neo4j derivada de la URI bolt.
pub fn browser_url(neo4j_uri: &str) -> String {
    // `Url::set_scheme` no permite pasar de `bolt` a `http`, se reconstruye.
    match Url::parse(neo4j_uri) {
        Ok(url) => format!("http://{}:7474", url.host_str().unwrap_or("localhost")),
        Err(_) => "http://localhost:7474".to_string(),
    }
}

/// Caché de `parsedQuoteData` guardada como JSON en el nodo (:QuoteDocument).
#[derive(Clone)]
pub struct Neo4jQuoteCache {
    graph: Arc<Graph>,
}

impl Neo4jQuoteCache {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl QuoteCache for Neo4jQuoteCache {
    async fn get_cached(&self, document_id: &str) -> Result<Option<ParsedQuoteData>> {
        let mut cursor = self
            .graph
            .execute(
                query("MATCH (q:QuoteDocument {id: $id}) RETURN q.parsed_quote_data AS data")
                    .param("id", document_id),
            )
            .await?;

        let Some(row) = cursor.next().await? else {
            return Ok(None);
        };
        match row.get::<String>("data") {
            Some(raw) => {
                let data = serde_json::from_str(&raw).map_err(|e| {
                    anyhow!("parsedQuoteData corrupto para {document_id}: {e}")
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn put_cached(&self, document_id: &str, data: &ParsedQuoteData) -> Result<()> {
        let raw = serde_json::to_string(data)?;
        self.graph
            .run(
                query(
                    "MERGE (q:QuoteDocument {id: $id})
                     SET q.parsed_quote_data = $data, q.parsed_at = datetime($parsed_at),
                         q.line_items = $line_items",
                )
                .param("id", document_id)
                .param("data", raw)
                .param("parsed_at", Utc::now().to_rfc3339())
                .param("line_items", data.line_items.len() as i64),
            )
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_url_points_to_http_port() {
        assert_eq!(browser_url("bolt://db.internal:7687"), "http://db.internal:7474");
        assert_eq!(browser_url("::not a uri::"), "http://localhost:7474");
    }
}
