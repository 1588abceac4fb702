//! SQLite-backed vector index with uint8-quantized embeddings.
//!
//! Rows live in SQLite; similarity search runs against an in-memory matrix
//! of L2-normalized embeddings so a query is one matrix-vector product.
//! Every path that touches both the connection and the matrix locks the
//! connection first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::embedding::{cosine_distance, l2_normalize, Quantized};
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use crate::vector::VectorIndex;
use linkweave_core::{Error, Result};

fn db_err(e: rusqlite::Error) -> Error {
    Error::UpstreamUnavailable(format!("vector index: {}", e))
}

/// Hex SHA-256 of a document's text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
    matrix: Mutex<EmbeddingMatrix>,
}

struct EmbeddingMatrix {
    /// Normalized embeddings, shape (N, dim).
    matrix: Array2<f32>,
    /// Document id of each row.
    ids: Vec<String>,
    rows: HashMap<String, usize>,
    /// Set after deletes; the next query rebuilds from SQLite.
    dirty: bool,
}

impl EmbeddingMatrix {
    fn empty(dim: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dim)),
            ids: Vec::new(),
            rows: HashMap::new(),
            dirty: false,
        }
    }

    fn put(&mut self, id: &str, normalized: &Array1<f32>) -> Result<()> {
        if let Some(&row) = self.rows.get(id) {
            self.matrix.row_mut(row).assign(normalized);
            return Ok(());
        }
        self.matrix
            .push(Axis(0), normalized.view())
            .map_err(|e| Error::Internal(format!("matrix append failed: {}", e)))?;
        self.rows.insert(id.to_string(), self.ids.len());
        self.ids.push(id.to_string());
        Ok(())
    }
}

impl SqliteVectorIndex {
    /// Open or create the index at `db_dir/linkweave.db`.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("linkweave.db");

        let conn = Connection::open(&db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::UpstreamUnavailable(format!("schema init failed: {}", e)))?;

        let index = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
            matrix: Mutex::new(EmbeddingMatrix::empty(embedding_dim)),
        };
        index.reload_matrix()?;

        info!(
            "SqliteVectorIndex initialized: {} documents, dim={}, path={}",
            index.count()?,
            embedding_dim,
            index.db_path.display()
        );
        Ok(index)
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn check_dim(&self, embedding: &Array1<f32>) -> Result<()> {
        if embedding.len() != self.embedding_dim {
            return Err(Error::InvalidArgument(format!(
                "embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.embedding_dim
            )));
        }
        Ok(())
    }

    /// Rebuild the in-memory matrix from SQLite.
    fn reload_matrix(&self) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT d.id, e.embedding, e.scale, e.offset_val \
                 FROM document_embeddings e JOIN documents d ON d.id = e.doc_id \
                 ORDER BY d.seq",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let bytes: Vec<u8> = row.get(1)?;
                let scale: f64 = row.get(2)?;
                let offset: f64 = row.get(3)?;
                Ok((id, bytes, scale as f32, offset as f32))
            })
            .map_err(db_err)?;

        let mut fresh = EmbeddingMatrix::empty(self.embedding_dim);
        for row in rows {
            let (id, bytes, scale, offset) = row.map_err(db_err)?;
            if bytes.len() != self.embedding_dim {
                debug!("Skipping {} with {} stored dimensions", id, bytes.len());
                continue;
            }
            let mut emb = Quantized {
                bytes,
                scale,
                offset,
            }
            .decode();
            l2_normalize(&mut emb);
            fresh.put(&id, &emb)?;
        }

        let mut mat = self.matrix.lock();
        debug!("Loaded {} embeddings into matrix", fresh.ids.len());
        *mat = fresh;
        Ok(())
    }

    fn ensure_matrix_loaded(&self) -> Result<()> {
        if self.matrix.lock().dirty {
            self.reload_matrix()?;
        }
        Ok(())
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDocument> {
        let metadata = row
            .get::<_, Option<String>>("metadata_json")?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Ok(StoredDocument {
            id: row.get("id")?,
            text: row.get("text")?,
            metadata,
            embedding: Array1::zeros(0),
            content_hash: row.get("content_hash")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl VectorIndex for SqliteVectorIndex {
    fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.check_dim(&record.embedding)?;
        let quantized = Quantized::encode(&record.embedding);
        let meta_json = serde_json::to_string(&record.metadata)?;
        let hash = content_hash(&record.text);
        let now = chrono::Utc::now().timestamp_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO documents (id, text, metadata_json, content_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(id) DO UPDATE SET text = excluded.text, \
             metadata_json = excluded.metadata_json, content_hash = excluded.content_hash, \
             updated_at = excluded.created_at",
            params![record.id, record.text, meta_json, hash, now],
        )
        .map_err(db_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO document_embeddings (doc_id, embedding, scale, offset_val) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                quantized.bytes,
                quantized.scale as f64,
                quantized.offset as f64
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        // Still holding the connection: keep the matrix in step with SQLite.
        let mut mat = self.matrix.lock();
        if !mat.dirty {
            let mut normalized = record.embedding;
            l2_normalize(&mut normalized);
            mat.put(&record.id, &normalized)?;
        }
        drop(mat);
        drop(conn);

        debug!(doc_id = %record.id, "Upserted vector record");
        Ok(())
    }

    fn query(&self, embedding: &Array1<f32>, top_k: usize) -> Result<Vec<VectorMatch>> {
        self.check_dim(embedding)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_matrix_loaded()?;

        let mut q = embedding.clone();
        if !l2_normalize(&mut q) {
            return Ok(Vec::new());
        }

        let ranked: Vec<(String, f64)> = {
            let mat = self.matrix.lock();
            if mat.matrix.nrows() == 0 {
                return Ok(Vec::new());
            }
            let similarities = mat.matrix.dot(&q);
            let mut indexed: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
            // Stable sort keeps insertion order among equal scores.
            indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            indexed.truncate(top_k);
            indexed
                .into_iter()
                .map(|(i, s)| (mat.ids[i].clone(), cosine_distance(s)))
                .collect()
        };

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM documents WHERE id = ?1")
            .map_err(db_err)?;
        let mut results = Vec::with_capacity(ranked.len());
        for (id, distance) in ranked {
            let doc = stmt
                .query_row(params![id], Self::row_to_document)
                .optional()
                .map_err(db_err)?;
            // A concurrent delete may have removed the row since ranking.
            if let Some(doc) = doc {
                results.push(VectorMatch {
                    id: doc.id,
                    text: doc.text,
                    metadata: doc.metadata,
                    distance,
                });
            }
        }
        Ok(results)
    }

    fn get(&self, id: &str) -> Result<StoredDocument> {
        let conn = self.conn.lock();
        let doc = conn
            .prepare_cached("SELECT * FROM documents WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![id], Self::row_to_document)
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;

        let embedding = conn
            .prepare_cached(
                "SELECT embedding, scale, offset_val FROM document_embeddings WHERE doc_id = ?1",
            )
            .map_err(db_err)?
            .query_row(params![id], |row| {
                Ok(Quantized {
                    bytes: row.get(0)?,
                    scale: row.get::<_, f64>(1)? as f32,
                    offset: row.get::<_, f64>(2)? as f32,
                })
            })
            .optional()
            .map_err(db_err)?
            .map(|q| q.decode())
            .unwrap_or_else(|| Array1::zeros(self.embedding_dim));

        Ok(StoredDocument { embedding, ..doc })
    }

    fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(db_err)?;
        if count == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }
        self.matrix.lock().dirty = true;
        debug!(doc_id = id, "Deleted vector record");
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(n as usize)
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT id FROM documents ORDER BY seq")
            .map_err(db_err)?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(db_err)?;
        Ok(ids)
    }
}
