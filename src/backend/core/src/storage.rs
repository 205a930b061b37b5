//! Upload storage.
//!
//! Validates and persists uploaded PDF files to disk. Stored files get a
//! random name so user-supplied filenames never touch the filesystem; the
//! original name is kept in the database only.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::db::DocumentType;
use crate::error::{Result, SiftError};

const PDF_MIME: &str = "application/pdf";

/// A file persisted by the store.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Generated on-disk filename
    pub filename: String,

    /// Full path of the stored file
    pub file_path: String,

    /// Size in bytes
    pub file_size: u64,
}

/// Validated PDF persistence rooted at the configured upload directory.
#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_file_size: u64,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.dir),
            max_file_size: config.max_file_size,
        }
    }

    /// Create the upload subdirectories if missing.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for doc_type in [DocumentType::Cv, DocumentType::ProjectReport] {
            fs::create_dir_all(self.root.join(Self::subdir(doc_type))).await?;
        }
        Ok(())
    }

    fn subdir(doc_type: DocumentType) -> &'static str {
        // Exhaustive on purpose: a new variant must pick its directory here.
        match doc_type {
            DocumentType::Cv => "cv",
            DocumentType::ProjectReport
            | DocumentType::JobDescription
            | DocumentType::CaseStudyBrief
            | DocumentType::ScoringRubric => "reports",
        }
    }

    /// Check an upload against size and type constraints before writing.
    pub fn validate(&self, original_filename: &str, content_type: &str, size: u64) -> Result<()> {
        if size == 0 {
            return Err(SiftError::new(
                crate::error::ErrorCode::EmptyUpload,
                "Uploaded file is empty",
            ));
        }

        if size > self.max_file_size {
            return Err(SiftError::file_too_large(size, self.max_file_size));
        }

        let extension_ok = Path::new(original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if content_type != PDF_MIME || !extension_ok {
            return Err(SiftError::unsupported_file_type(content_type));
        }

        Ok(())
    }

    /// Validate and write an upload, returning the stored metadata.
    pub async fn save(
        &self,
        doc_type: DocumentType,
        original_filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        self.validate(original_filename, content_type, data.len() as u64)?;

        let filename = format!("{}.pdf", Uuid::new_v4());
        let path = self.root.join(Self::subdir(doc_type)).join(&filename);

        fs::write(&path, data).await?;

        Ok(StoredFile {
            filename,
            file_path: path.to_string_lossy().into_owned(),
            file_size: data.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(dir: &Path) -> UploadStore {
        UploadStore::new(&UploadConfig {
            dir: dir.to_string_lossy().into_owned(),
            max_file_size: 1024,
        })
    }

    #[tokio::test]
    async fn test_save_writes_pdf_with_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());
        store.ensure_dirs().await.unwrap();

        let stored = store
            .save(DocumentType::Cv, "resume.pdf", "application/pdf", b"%PDF-1.7")
            .await
            .unwrap();

        assert!(stored.filename.ends_with(".pdf"));
        assert_ne!(stored.filename, "resume.pdf");
        assert_eq!(stored.file_size, 8);
        assert!(fs::try_exists(&stored.file_path).await.unwrap());
    }

    #[tokio::test]
    async fn test_each_document_type_lands_in_its_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());
        store.ensure_dirs().await.unwrap();

        let cv = store
            .save(DocumentType::Cv, "resume.pdf", "application/pdf", b"%PDF-1.7")
            .await
            .unwrap();
        assert!(Path::new(&cv.file_path).parent().unwrap().ends_with("cv"));

        for doc_type in [
            DocumentType::ProjectReport,
            DocumentType::JobDescription,
            DocumentType::CaseStudyBrief,
            DocumentType::ScoringRubric,
        ] {
            let stored = store
                .save(doc_type, "doc.pdf", "application/pdf", b"%PDF-1.7")
                .await
                .unwrap();
            assert!(Path::new(&stored.file_path)
                .parent()
                .unwrap()
                .ends_with("reports"));
        }
    }

    #[tokio::test]
    async fn test_rejects_oversize_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());

        let big = vec![0u8; 2048];
        let err = store
            .save(DocumentType::Cv, "resume.pdf", "application/pdf", &big)
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::FileTooLarge);
    }

    #[tokio::test]
    async fn test_rejects_wrong_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());

        let err = store
            .save(DocumentType::Cv, "resume.pdf", "text/plain", b"hello")
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::UnsupportedFileType);
    }

    #[tokio::test]
    async fn test_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());

        let err = store
            .save(DocumentType::Cv, "resume.docx", "application/pdf", b"data")
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::UnsupportedFileType);
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(dir.path());

        let err = store
            .save(DocumentType::Cv, "resume.pdf", "application/pdf", b"")
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::error::ErrorCode::EmptyUpload);
    }
}
