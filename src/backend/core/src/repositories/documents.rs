//! Document persistence.

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{DocumentRow, DocumentType};
use crate::error::Result;

/// Metadata for a freshly stored upload.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub document_type: DocumentType,
}

#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a document record and return the stored row.
    pub async fn create(&self, doc: NewDocument) -> Result<DocumentRow> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (id, filename, original_filename, file_path,
                                   file_size, mime_type, document_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, filename, original_filename, file_path, file_size,
                      mime_type, document_type, uploaded_at, deleted_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&doc.filename)
        .bind(&doc.original_filename)
        .bind(&doc.file_path)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(doc.document_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get a document by ID. Soft-deleted documents are invisible.
    pub async fn get(&self, id: Uuid) -> Result<Option<DocumentRow>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, filename, original_filename, file_path, file_size,
                   mime_type, document_type, uploaded_at, deleted_at
            FROM documents
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Soft-delete a document.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
