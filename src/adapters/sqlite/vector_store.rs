//! SQLite implementation of the VectorStore.
//!
//! Embeddings are stored as little-endian f32 BLOBs. Metadata filters run in
//! SQL; cosine distance is computed in Rust over the filtered rows.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::warn;

use crate::domain::errors::DependencyError;
use crate::domain::models::embedding::{bytes_to_embedding, embedding_to_bytes};
use crate::domain::models::{cosine_distance, Candidate, EmotionTone, SearchFilters, SearchHit};
use crate::domain::ports::VectorStore;

const CANDIDATE_COLUMNS: &str = "id, code, description, category, emotion_tone, usage_scene, \
                                 priority, embedding, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Classify a sqlx failure for the resilience layer.
fn map_sqlx_error(error: sqlx::Error) -> DependencyError {
    match error {
        sqlx::Error::PoolTimedOut => DependencyError::Timeout,
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            DependencyError::Unavailable(error.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => DependencyError::Connection(error.to_string()),
        sqlx::Error::Database(ref db) if is_busy(db.message()) => {
            DependencyError::Unavailable(error.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            DependencyError::MalformedResponse(error.to_string())
        }
        other => DependencyError::Rejected(other.to_string()),
    }
}

fn is_busy(message: &str) -> bool {
    message.contains("database is locked") || message.contains("database is busy")
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, DependencyError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        builder.push(CANDIDATE_COLUMNS);
        builder.push(" FROM candidates WHERE embedding IS NOT NULL");

        if let Some(tone) = filters.emotion_tone {
            builder.push(" AND emotion_tone = ").push_bind(tone.as_str());
        }
        if let Some(category) = &filters.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(scene) = &filters.usage_scene {
            builder.push(" AND usage_scene = ").push_bind(scene.as_str());
        }

        let rows: Vec<CandidateRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let mut candidate = Candidate::try_from(row)?;
            let Some(stored) = candidate.embedding.take() else {
                continue;
            };
            if stored.len() != embedding.len() {
                warn!(
                    code = %candidate.code,
                    stored = stored.len(),
                    expected = embedding.len(),
                    "Skipping candidate with stale embedding dimension"
                );
                continue;
            }
            hits.push(SearchHit {
                distance: cosine_distance(embedding, &stored),
                candidate,
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn upsert_embedding(&self, id: i64, embedding: &[f32]) -> Result<(), DependencyError> {
        let result = sqlx::query("UPDATE candidates SET embedding = ?, updated_at = ? WHERE id = ?")
            .bind(embedding_to_bytes(embedding))
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(DependencyError::Rejected(format!("no candidate with id {id}")));
        }
        Ok(())
    }

    async fn insert_candidates(
        &self,
        candidates: &[Candidate],
    ) -> Result<Vec<Candidate>, DependencyError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let now = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let (id,): (i64,) = sqlx::query_as(
                r"INSERT INTO candidates (code, description, category, emotion_tone, usage_scene,
                                          priority, embedding, created_at, updated_at)
                  VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                  ON CONFLICT(code) DO UPDATE SET
                      description = excluded.description,
                      category = excluded.category,
                      emotion_tone = excluded.emotion_tone,
                      usage_scene = excluded.usage_scene,
                      priority = excluded.priority,
                      embedding = COALESCE(excluded.embedding, candidates.embedding),
                      updated_at = excluded.updated_at
                  RETURNING id",
            )
            .bind(&candidate.code)
            .bind(&candidate.description)
            .bind(&candidate.category)
            .bind(candidate.emotion_tone.map(|t| t.as_str()))
            .bind(&candidate.usage_scene)
            .bind(i64::from(candidate.priority))
            .bind(candidate.embedding.as_deref().map(embedding_to_bytes))
            .bind(&now)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            ids.push(id);
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        let mut stored = Vec::with_capacity(ids.len());
        for id in ids {
            let row: CandidateRow = sqlx::query_as(&format!(
                "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ?"
            ))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            stored.push(Candidate::try_from(row)?);
        }
        Ok(stored)
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>, DependencyError> {
        let rows: Vec<CandidateRow> = sqlx::query_as(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Candidate::try_from).collect()
    }

    async fn count(&self) -> Result<usize, DependencyError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM candidates")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: i64,
    code: String,
    description: String,
    category: Option<String>,
    emotion_tone: Option<String>,
    usage_scene: Option<String>,
    priority: i64,
    embedding: Option<Vec<u8>>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = DependencyError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let emotion_tone = row
            .emotion_tone
            .as_deref()
            .map(str::parse::<EmotionTone>)
            .transpose()
            .map_err(|e| DependencyError::MalformedResponse(e.to_string()))?;

        let embedding = row
            .embedding
            .map(|bytes| {
                bytes_to_embedding(&bytes).ok_or_else(|| {
                    DependencyError::MalformedResponse(format!(
                        "embedding for {} has {} bytes, not a multiple of 4",
                        row.code,
                        bytes.len()
                    ))
                })
            })
            .transpose()?;

        let priority = u32::try_from(row.priority)
            .map_err(|_| DependencyError::MalformedResponse(format!("priority {}", row.priority)))?;

        Ok(Candidate {
            id: row.id,
            code: row.code,
            description: row.description,
            category: row.category,
            emotion_tone,
            usage_scene: row.usage_scene,
            priority,
            embedding,
            created_at: Some(super::parse_datetime(&row.created_at)?),
            updated_at: Some(super::parse_datetime(&row.updated_at)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_store() -> SqliteVectorStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteVectorStore::new(pool)
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = setup_store().await;
        let inserted = store
            .insert_candidates(&[
                Candidate::new(":smile:", "happy")
                    .with_priority(5)
                    .with_emotion_tone(EmotionTone::Positive)
                    .with_category("face"),
                Candidate::new(":cry:", "sad").with_embedding(vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(inserted.len(), 2);
        assert!(inserted[0].id > 0);
        assert_eq!(inserted[0].priority, 5);
        assert_eq!(inserted[0].emotion_tone, Some(EmotionTone::Positive));
        assert!(inserted[0].created_at.is_some());
        assert_eq!(inserted[1].embedding, Some(vec![0.0, 1.0]));

        assert_eq!(store.count().await.unwrap(), 2);
        let listed = store.list_candidates().await.unwrap();
        assert_eq!(listed, inserted);
    }

    #[tokio::test]
    async fn test_reimport_keeps_id_and_embedding() {
        let store = setup_store().await;
        let first = store
            .insert_candidates(&[Candidate::new(":wave:", "hello").with_embedding(vec![1.0, 0.0])])
            .await
            .unwrap();
        let second = store
            .insert_candidates(&[Candidate::new(":wave:", "greeting").with_priority(3)])
            .await
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].description, "greeting");
        assert_eq!(second[0].priority, 3);
        assert_eq!(second[0].embedding, Some(vec![1.0, 0.0]));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance_and_filters() {
        let store = setup_store().await;
        store
            .insert_candidates(&[
                Candidate::new(":near:", "n")
                    .with_embedding(vec![1.0, 0.1])
                    .with_category("a"),
                Candidate::new(":far:", "f")
                    .with_embedding(vec![0.0, 1.0])
                    .with_category("b"),
                Candidate::new(":mid:", "m")
                    .with_embedding(vec![1.0, 1.0])
                    .with_category("a"),
                Candidate::new(":none:", "no embedding").with_category("a"),
            ])
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, &SearchFilters::default())
            .await
            .unwrap();
        let codes: Vec<&str> = hits.iter().map(|h| h.candidate.code.as_str()).collect();
        assert_eq!(codes, vec![":near:", ":mid:", ":far:"]);
        assert!(hits.iter().all(|h| h.candidate.embedding.is_none()));

        let filters = SearchFilters {
            category: Some("a".to_string()),
            ..Default::default()
        };
        let hits = store.query(&[1.0, 0.0], 1, &filters).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].candidate.code, ":near:");
    }

    #[tokio::test]
    async fn test_query_drops_embeddings_of_another_dimension() {
        let store = setup_store().await;
        store
            .insert_candidates(&[
                Candidate::new(":ok:", "fits").with_embedding(vec![0.0, 1.0]),
                Candidate::new(":old:", "older model").with_embedding(vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].candidate.code, ":ok:");
    }

    #[tokio::test]
    async fn test_upsert_embedding() {
        let store = setup_store().await;
        let inserted = store
            .insert_candidates(&[Candidate::new(":tada:", "celebrate")])
            .await
            .unwrap();

        store.upsert_embedding(inserted[0].id, &[0.5, 0.5]).await.unwrap();
        let listed = store.list_candidates().await.unwrap();
        assert_eq!(listed[0].embedding, Some(vec![0.5, 0.5]));

        let err = store.upsert_embedding(9999, &[0.5, 0.5]).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_closed_pool_is_transient() {
        let store = setup_store().await;
        store.pool().close().await;
        let err = store.count().await.unwrap_err();
        assert!(err.is_transient());
    }
}
