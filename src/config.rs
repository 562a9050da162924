//! Carga y gestión de configuración de la aplicación (Neo4j + LLM + motor).

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Puntuación mínima para considerar una coincidencia como real.
pub const DEFAULT_MATCH_SCORE_THRESHOLD: u8 = 50;
/// Por debajo de estas palabras por página el documento se trata como escaneado.
pub const DEFAULT_SCANNED_WORDS_PER_PAGE: usize = 50;

#[derive(Clone, Debug, PartialEq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Implementación usada para conciliar cotizaciones con la BOM.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReconcilerKind {
    Llm,
    Fuzzy,
}

impl ReconcilerKind {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "fuzzy" => Ok(Self::Fuzzy),
            other => Err(anyhow!("Conciliador no soportado: {other}")),
        }
    }
}

/// Parámetros ajustables del motor de cumplimiento.
#[derive(Clone, Debug, PartialEq)]
pub struct EnginePolicy {
    pub match_score_threshold: u8,
    pub scanned_words_per_page: usize,
    /// Cotizaciones resueltas a la vez. 1 = secuencial, que es la política por defecto.
    pub quote_concurrency: usize,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            match_score_threshold: DEFAULT_MATCH_SCORE_THRESHOLD,
            scanned_words_per_page: DEFAULT_SCANNED_WORDS_PER_PAGE,
            quote_concurrency: 1,
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_chat_model: String,
    pub llm_vision_model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,

    pub reconciler: ReconcilerKind,
    pub policy: EnginePolicy,
    pub request_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let neo4j_uri = env::var("NEO4J_URI")
            .map_err(|_| anyhow!("Falta NEO4J_URI en el entorno"))?;
        let neo4j_user = env::var("NEO4J_USER")
            .map_err(|_| anyhow!("Falta NEO4J_USER en el entorno"))?;
        let neo4j_password = env::var("NEO4J_PASSWORD")
            .map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?;

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        let llm_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let llm_vision_model =
            env::var("LLM_VISION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let openai_base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let reconciler_str = env::var("RECONCILER").unwrap_or_else(|_| "llm".to_string());
        let reconciler = ReconcilerKind::from_str(&reconciler_str)?;

        let policy = EnginePolicy {
            match_score_threshold: parse_var(
                "MATCH_SCORE_THRESHOLD",
                DEFAULT_MATCH_SCORE_THRESHOLD,
            )?,
            scanned_words_per_page: parse_var(
                "SCANNED_WORDS_PER_PAGE",
                DEFAULT_SCANNED_WORDS_PER_PAGE,
            )?,
            quote_concurrency: parse_var("QUOTE_CONCURRENCY", 1usize)?,
        };
        if policy.match_score_threshold > 100 {
            return Err(anyhow!("MATCH_SCORE_THRESHOLD debe estar entre 0 y 100"));
        }
        if policy.quote_concurrency == 0 {
            return Err(anyhow!("QUOTE_CONCURRENCY debe ser al menos 1"));
        }

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            server_addr,
            llm_provider,
            llm_chat_model,
            llm_vision_model,
            openai_api_key,
            openai_base_url,
            reconciler,
            policy,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 300u64)?,
            fetch_timeout_secs: parse_var("FETCH_TIMEOUT_SECS", 60u64)?,
        })
    }

    /// Indica si la IA puede usarse con esta configuración.
    pub fn ai_configured(&self) -> bool {
        self.llm_provider == LlmProvider::OpenAI && self.openai_api_key.is_some()
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Valor inválido para {name} ('{raw}'): {e}")),
        Err(_) => Ok(default),
    }
}
