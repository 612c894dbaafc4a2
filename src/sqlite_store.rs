//! SQLite-backed [`Store`] implementation.
//!
//! Documents, chunks, embeddings, and the vocabulary live in the tables
//! created by [`migrate`](crate::migrate). Structured columns (chunk kind,
//! metadata) are stored as JSON text; vectors as little-endian `f32` BLOBs.
//! Foreign keys cascade, so deleting a document removes its chunks and
//! their embeddings.

use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use docindex_core::embedding::{blob_to_vec, vec_to_blob};
use docindex_core::error::{IndexError, Result};
use docindex_core::models::{
    Chunk, ChunkKind, ChunkMetadata, ContentType, Document, DocumentMetadata, Embedding,
    EmbeddingMethod,
};
use docindex_core::store::{DocumentFilter, EmbeddingRecord, Snapshot, Store, StoreStats};
use docindex_core::vocabulary::{Vocabulary, VocabularyTerm};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn write_err(e: impl Display) -> IndexError {
    IndexError::StorageWriteFailed(e.to_string())
}

fn read_err(e: impl Display) -> IndexError {
    IndexError::StorageReadFailed(e.to_string())
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| read_err(format!("bad timestamp '{}': {}", s, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(write_err)
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(read_err)
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(read_err)
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let content_type: String = get(row, "content_type")?;
    let metadata: String = get(row, "metadata_json")?;
    let indexed_at: String = get(row, "indexed_at")?;
    Ok(Document {
        id: get(row, "id")?,
        filename: get(row, "filename")?,
        path: get(row, "path")?,
        content_type: ContentType::from_str(&content_type).map_err(read_err)?,
        size_bytes: get::<i64>(row, "size_bytes")? as u64,
        content_hash: get(row, "content_hash")?,
        metadata: from_json::<DocumentMetadata>(&metadata)?,
        indexed_at: parse_ts(&indexed_at)?,
        chunk_count: get::<i64>(row, "chunk_count")? as usize,
    })
}

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk> {
    let kind: String = get(row, "kind_json")?;
    let metadata: String = get(row, "chunk_metadata_json")?;
    Ok(Chunk {
        id: get(row, "chunk_id")?,
        document_id: get(row, "document_id")?,
        content: get(row, "content")?,
        kind: from_json::<ChunkKind>(&kind)?,
        chunk_index: get::<i64>(row, "chunk_index")? as usize,
        start: get::<i64>(row, "start_offset")? as usize,
        end: get::<i64>(row, "end_offset")? as usize,
        metadata: from_json::<ChunkMetadata>(&metadata)?,
    })
}

fn row_to_embedding(row: &SqliteRow) -> Result<Embedding> {
    let blob: Vec<u8> = get(row, "vector")?;
    let method: String = get(row, "method")?;
    let created_at: String = get(row, "embedding_created_at")?;
    Ok(Embedding {
        chunk_id: get(row, "chunk_id")?,
        vector: blob_to_vec(&blob),
        magnitude: get::<f64>(row, "magnitude")? as f32,
        dimensions: get::<i64>(row, "dimensions")? as usize,
        method: EmbeddingMethod::from_str(&method)?,
        non_zero_count: get::<i64>(row, "non_zero_count")? as usize,
        vocabulary_epoch: get(row, "vocabulary_epoch")?,
        created_at: parse_ts(&created_at)?,
    })
}

const DOCUMENT_COLUMNS: &str = "id, filename, path, content_type, size_bytes, content_hash, \
     metadata_json, indexed_at, chunk_count";

const CHUNK_COLUMNS: &str = "c.id AS chunk_id, c.document_id, c.content, c.kind_json, \
     c.chunk_index, c.start_offset, c.end_offset, c.metadata_json AS chunk_metadata_json";

const EMBEDDING_COLUMNS: &str = "e.vector, e.magnitude, e.dimensions, e.method, \
     e.non_zero_count, e.vocabulary_epoch, e.created_at AS embedding_created_at";

async fn write_document(conn: &mut SqliteConnection, doc: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, filename, path, content_type, size_bytes, content_hash,
                               metadata_json, indexed_at, chunk_count)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            filename = excluded.filename,
            path = excluded.path,
            content_type = excluded.content_type,
            size_bytes = excluded.size_bytes,
            content_hash = excluded.content_hash,
            metadata_json = excluded.metadata_json,
            indexed_at = excluded.indexed_at,
            chunk_count = excluded.chunk_count
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.filename)
    .bind(&doc.path)
    .bind(doc.content_type.as_str())
    .bind(doc.size_bytes as i64)
    .bind(&doc.content_hash)
    .bind(to_json(&doc.metadata)?)
    .bind(format_ts(&doc.indexed_at))
    .bind(doc.chunk_count as i64)
    .execute(&mut *conn)
    .await
    .map_err(write_err)?;
    Ok(())
}

async fn write_chunks(conn: &mut SqliteConnection, document_id: &str, chunks: &[Chunk]) -> Result<()> {
    // Embeddings of the old chunks go with them (ON DELETE CASCADE).
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;

    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, content, kind_json,
                                start_offset, end_offset, metadata_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(document_id)
        .bind(chunk.chunk_index as i64)
        .bind(&chunk.content)
        .bind(to_json(&chunk.kind)?)
        .bind(chunk.start as i64)
        .bind(chunk.end as i64)
        .bind(to_json(&chunk.metadata)?)
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
    }

    let updated = sqlx::query("UPDATE documents SET chunk_count = ? WHERE id = ?")
        .bind(chunks.len() as i64)
        .bind(document_id)
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
    if updated.rows_affected() == 0 {
        return Err(write_err(format!("unknown document {}", document_id)));
    }
    Ok(())
}

async fn write_embeddings(conn: &mut SqliteConnection, embeddings: &[Embedding]) -> Result<()> {
    for e in embeddings {
        sqlx::query(
            r#"
            INSERT INTO embeddings (chunk_id, vector, magnitude, dimensions, method,
                                    non_zero_count, vocabulary_epoch, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                vector = excluded.vector,
                magnitude = excluded.magnitude,
                dimensions = excluded.dimensions,
                method = excluded.method,
                non_zero_count = excluded.non_zero_count,
                vocabulary_epoch = excluded.vocabulary_epoch,
                created_at = excluded.created_at
            "#,
        )
        .bind(&e.chunk_id)
        .bind(vec_to_blob(&e.vector))
        .bind(e.magnitude as f64)
        .bind(e.dimensions as i64)
        .bind(e.method.as_str())
        .bind(e.non_zero_count as i64)
        .bind(&e.vocabulary_epoch)
        .bind(format_ts(&e.created_at))
        .execute(&mut *conn)
        .await
        .map_err(write_err)?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_document(&self, doc: &Document) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(write_err)?;
        write_document(&mut conn, doc).await
    }

    async fn put_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;
        write_chunks(&mut tx, document_id, chunks).await?;
        tx.commit().await.map_err(write_err)
    }

    async fn put_embeddings(&self, embeddings: &[Embedding]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;
        write_embeddings(&mut tx, embeddings).await?;
        tx.commit().await.map_err(write_err)
    }

    async fn put_vocabulary(&self, vocab: &Vocabulary) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;

        sqlx::query("DELETE FROM vocabulary")
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        sqlx::query("DELETE FROM vocabulary_meta")
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        for t in vocab.terms() {
            sqlx::query(
                "INSERT INTO vocabulary (term, term_index, idf, document_frequency) VALUES (?, ?, ?, ?)",
            )
            .bind(&t.term)
            .bind(t.index as i64)
            .bind(t.idf as f64)
            .bind(t.document_frequency as i64)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        sqlx::query(
            "INSERT INTO vocabulary_meta (id, epoch, document_count, max_terms, created_at) VALUES (1, ?, ?, ?, ?)",
        )
        .bind(&vocab.epoch)
        .bind(vocab.document_count as i64)
        .bind(vocab.max_terms as i64)
        .bind(format_ts(&vocab.created_at))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        tx.commit().await.map_err(write_err)
    }

    async fn put_indexed_document(
        &self,
        doc: &Document,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(write_err)?;
        write_document(&mut tx, doc).await?;
        write_chunks(&mut tx, &doc.id, chunks).await?;
        write_embeddings(&mut tx, embeddings).await?;
        tx.commit().await.map_err(write_err)
    }

    async fn get_vocabulary(&self) -> Result<Option<Vocabulary>> {
        let meta = sqlx::query(
            "SELECT epoch, document_count, max_terms, created_at FROM vocabulary_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        let meta = match meta {
            Some(row) => row,
            None => return Ok(None),
        };

        let rows = sqlx::query(
            "SELECT term, term_index, idf, document_frequency FROM vocabulary ORDER BY term_index",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let terms = rows
            .iter()
            .map(|row| {
                Ok(VocabularyTerm {
                    term: get(row, "term")?,
                    index: get::<i64>(row, "term_index")? as usize,
                    idf: get::<f64>(row, "idf")? as f32,
                    document_frequency: get::<i64>(row, "document_frequency")? as usize,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let created_at: String = get(&meta, "created_at")?;
        Ok(Some(Vocabulary::from_parts(
            terms,
            get::<i64>(&meta, "document_count")? as usize,
            get::<i64>(&meta, "max_terms")? as usize,
            get(&meta, "epoch")?,
            parse_ts(&created_at)?,
        )))
    }

    async fn all_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let sql = format!(
            "SELECT {}, {}, d.filename FROM embeddings e \
             JOIN chunks c ON c.id = e.chunk_id \
             JOIN documents d ON d.id = c.document_id \
             ORDER BY c.document_id, c.chunk_index",
            CHUNK_COLUMNS, EMBEDDING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;

        rows.iter()
            .map(|row| {
                Ok(EmbeddingRecord {
                    embedding: row_to_embedding(row)?,
                    chunk: row_to_chunk(row)?,
                    filename: get(row, "filename")?,
                })
            })
            .collect()
    }

    async fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT {} FROM chunks c ORDER BY c.document_id, c.chunk_index",
            CHUNK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;
        rows.iter().map(row_to_chunk).collect()
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT {} FROM chunks c WHERE c.document_id = ? ORDER BY c.chunk_index",
            CHUNK_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;
        rows.iter().map(row_to_chunk).collect()
    }

    async fn count_stale(&self, epoch: &str) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE vocabulary_epoch != ?")
                .bind(epoch)
                .fetch_one(&self.pool)
                .await
                .map_err(read_err)?;
        Ok(count as usize)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn find_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents \
             WHERE (?1 IS NULL OR content_type = ?1) \
               AND (?2 IS NULL OR instr(lower(filename), lower(?2)) > 0) \
             ORDER BY indexed_at DESC, id ASC \
             LIMIT ?3",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.content_type.map(|ct| ct.as_str()))
            .bind(filter.filename_contains.as_deref())
            .bind(filter.limit.map_or(-1, |l| l as i64))
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;
        rows.iter().map(row_to_document).collect()
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM documents) AS documents,
                (SELECT COUNT(*) FROM chunks) AS chunks,
                (SELECT COUNT(*) FROM embeddings) AS embeddings,
                (SELECT COUNT(*) FROM vocabulary) AS vocabulary_size,
                (SELECT COALESCE(SUM(size_bytes), 0) FROM documents) AS total_bytes
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(read_err)?;

        Ok(StoreStats::new(
            get::<i64>(&row, "documents")? as usize,
            get::<i64>(&row, "chunks")? as usize,
            get::<i64>(&row, "embeddings")? as usize,
            get::<i64>(&row, "vocabulary_size")? as usize,
            get::<i64>(&row, "total_bytes")? as u64,
        ))
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let sql = format!("SELECT {} FROM documents ORDER BY id", DOCUMENT_COLUMNS);
        let documents = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?
            .iter()
            .map(row_to_document)
            .collect::<Result<Vec<_>>>()?;

        let chunks = self.all_chunks().await?;
        let embeddings = self
            .all_embeddings()
            .await?
            .into_iter()
            .map(|r| r.embedding)
            .collect();

        Ok(Snapshot {
            stats: self.stats().await?,
            documents,
            chunks,
            embeddings,
            vocabulary: self.get_vocabulary().await?,
        })
    }
}
