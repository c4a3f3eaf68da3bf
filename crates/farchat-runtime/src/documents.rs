//! Regulation Document Index
//!
//! Vector search over ingested regulation chunks and per-regulation counts,
//! both served by the Supabase `document_chunks` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use farchat_core::{FarchatError, Result};

use crate::embeddings::Embedder;
use crate::supabase::SupabaseClient;

/// Minimum cosine similarity for a search hit
pub const MATCH_THRESHOLD: f32 = 0.1;

/// Hits returned per search
pub const MATCH_COUNT: u32 = 10;

/// Queries shorter than this are not searched
pub const MIN_QUERY_CHARS: usize = 3;

/// Postgres `undefined_function`
const UNDEFINED_FUNCTION: &str = "42883";

/// A chunk returned by `match_documents`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatch {
    #[serde(default)]
    pub id: Value,

    pub content: String,

    #[serde(default)]
    pub metadata: Value,

    #[serde(default)]
    pub similarity: f64,
}

/// Chunk count for one regulation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulationStat {
    pub regulation: String,
    #[serde(alias = "document_count")]
    pub document_count: u64,
}

/// Body of `GET /api/regulations`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulationStats {
    pub stats: Vec<RegulationStat>,
    pub total_documents: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl RegulationStats {
    pub fn new(stats: Vec<RegulationStat>) -> Self {
        let total_documents = stats.iter().map(|s| s.document_count).sum();
        Self {
            stats,
            total_documents,
            last_updated: Some(Utc::now()),
        }
    }
}

#[derive(Deserialize)]
struct ChunkMetadata {
    #[serde(default)]
    metadata: Option<Value>,
}

/// Count chunks per `metadata.regulation`, keeping first-seen order.
/// Chunks without a regulation are not counted.
fn count_by_regulation(chunks: &[ChunkMetadata]) -> Vec<RegulationStat> {
    let mut stats: Vec<RegulationStat> = Vec::new();

    for regulation in chunks.iter().filter_map(|c| {
        c.metadata
            .as_ref()
            .and_then(|m| m.get("regulation"))
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
    }) {
        match stats.iter_mut().find(|s| s.regulation == regulation) {
            Some(stat) => stat.document_count += 1,
            None => stats.push(RegulationStat {
                regulation: regulation.to_string(),
                document_count: 1,
            }),
        }
    }

    stats
}

/// Search and statistics over the document store
#[derive(Clone, Debug)]
pub struct RegulationIndex {
    client: SupabaseClient,
    embedder: Option<Embedder>,
}

impl RegulationIndex {
    /// Without an embedder only statistics are available
    pub fn new(client: SupabaseClient, embedder: Option<Embedder>) -> Self {
        Self { client, embedder }
    }

    /// Chunks most similar to `query`; short queries yield nothing
    pub async fn search(&self, query: &str) -> Result<Vec<DocumentMatch>> {
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }

        let embedder = self.embedder.as_ref().ok_or_else(|| {
            FarchatError::Config(
                "LLM API key (OpenRouter or OpenAI) not configured for embeddings".into(),
            )
        })?;
        let embedding = embedder.embed(query).await?;

        let documents: Option<Vec<DocumentMatch>> = self
            .client
            .rpc(
                "match_documents",
                &json!({
                    "query_embedding": embedding,
                    "match_threshold": MATCH_THRESHOLD,
                    "match_count": MATCH_COUNT,
                }),
            )
            .await?;

        let documents = documents.unwrap_or_default();
        tracing::debug!(hits = documents.len(), "Regulation search");
        Ok(documents)
    }

    /// Per-regulation chunk counts.
    ///
    /// Uses the `get_regulation_stats` function, counting rows directly when
    /// the database does not define it.
    pub async fn stats(&self) -> Result<RegulationStats> {
        match self
            .client
            .rpc::<_, Option<Vec<RegulationStat>>>("get_regulation_stats", &json!({}))
            .await
        {
            Ok(stats) => Ok(RegulationStats::new(stats.unwrap_or_default())),
            Err(FarchatError::Database { code: Some(code), .. }) if code == UNDEFINED_FUNCTION => {
                tracing::info!("get_regulation_stats missing, counting document_chunks");
                let chunks: Vec<ChunkMetadata> =
                    self.client.select("document_chunks", "metadata").await?;
                Ok(RegulationStats::new(count_by_regulation(&chunks)))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{Json, Router, http::StatusCode, routing::{get, post}};

    use crate::embeddings::EmbeddingConfig;
    use crate::supabase::SupabaseConfig;
    use crate::test_support::serve;

    fn chunk(metadata: Value) -> ChunkMetadata {
        ChunkMetadata {
            metadata: Some(metadata),
        }
    }

    #[test]
    fn test_count_keeps_first_seen_order() {
        let chunks = vec![
            chunk(json!({ "regulation": "DFARS" })),
            chunk(json!({ "regulation": "FAR" })),
            chunk(json!({ "regulation": "DFARS" })),
            chunk(json!({ "source": "untagged.pdf" })),
            ChunkMetadata { metadata: None },
        ];

        let stats = RegulationStats::new(count_by_regulation(&chunks));
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.stats[0].regulation, "DFARS");
        assert_eq!(stats.stats[0].document_count, 2);
        assert_eq!(stats.stats[1].regulation, "FAR");
    }

    #[test]
    fn test_stats_wire_shape() {
        let stats = RegulationStats::new(vec![RegulationStat {
            regulation: "FAR".into(),
            document_count: 4,
        }]);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["stats"][0]["documentCount"], 4);
        assert_eq!(value["totalDocuments"], 4);
        assert!(value["lastUpdated"].is_string());
    }

    /// Supabase project without `get_regulation_stats`
    async fn legacy_project() -> String {
        let app = Router::new()
            .route(
                "/rest/v1/rpc/get_regulation_stats",
                post(|| async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "code": "42883", "message": "function does not exist" })),
                    )
                }),
            )
            .route(
                "/rest/v1/document_chunks",
                get(|| async {
                    Json(json!([
                        { "metadata": { "regulation": "FAR" } },
                        { "metadata": { "regulation": "VAAR" } },
                        { "metadata": { "regulation": "FAR" } },
                    ]))
                }),
            )
            .route(
                "/rest/v1/rpc/match_documents",
                post(|Json(params): Json<Value>| async move {
                    Json(json!([{
                        "id": 12,
                        "content": "15.404-1 Proposal analysis techniques.",
                        "metadata": { "regulation": "FAR" },
                        "similarity": params["match_threshold"].as_f64().map(|t| t + 0.7),
                    }]))
                }),
            )
            .route(
                "/embeddings",
                post(|| async { Json(json!({ "data": [{ "embedding": [0.1, 0.2] }] })) }),
            );
        serve(app).await
    }

    async fn index(with_embedder: bool) -> RegulationIndex {
        let base = legacy_project().await;
        let client = SupabaseClient::server(&SupabaseConfig::new(base.clone(), "anon"));
        let embedder = with_embedder.then(|| {
            Embedder::new(EmbeddingConfig {
                base_url: base,
                ..EmbeddingConfig::openai("sk-test")
            })
        });
        RegulationIndex::new(client, embedder)
    }

    #[tokio::test]
    async fn test_stats_fall_back_to_counting_chunks() {
        let stats = index(false).await.stats().await.unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(
            stats.stats,
            vec![
                RegulationStat { regulation: "FAR".into(), document_count: 2 },
                RegulationStat { regulation: "VAAR".into(), document_count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_search_returns_matches() {
        let hits = index(true).await.search("proposal analysis").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, json!(12));
        assert!((hits[0].similarity - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_short_query_is_not_searched() {
        // No embedder configured: a real search would fail
        assert!(index(false).await.search("ab").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_without_embedder_is_config_error() {
        assert!(matches!(
            index(false).await.search("sole source").await,
            Err(FarchatError::Config(_))
        ));
    }
}
