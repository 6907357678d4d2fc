//! Local file checks run before any network call

use ragdesk_common::errors::{AppError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Largest file accepted for upload (100 MiB)
pub const MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Accepted extensions and the MIME type sent with the upload
pub const SUPPORTED_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("hwp", "application/x-hwp"),
    ("hwpx", "application/x-hwp-v5"),
];

/// A file that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileValidation {
    pub valid: bool,
    pub size: u64,
    pub mime_type: String,
    /// File name without directories
    pub name: String,
}

/// MIME type for an extension, case-insensitive
pub fn mime_type_for(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    SUPPORTED_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

fn supported_list() -> String {
    SUPPORTED_TYPES
        .iter()
        .map(|(ext, _)| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a local file against the size and type limits.
///
/// Checks run in order: existence, regular file, size, extension. The first
/// failing check decides the error.
pub fn validate(path: &Path) -> Result<FileValidation> {
    let display = path.display().to_string();

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::FileNotFound { path: display });
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(AppError::NotAFile { path: display });
    }

    let size = metadata.len();
    if size > MAX_FILE_SIZE_BYTES {
        return Err(AppError::PayloadTooLarge {
            size,
            limit: MAX_FILE_SIZE_BYTES,
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime_type = mime_type_for(extension).ok_or_else(|| AppError::UnsupportedFileType {
        extension: format!(".{}", extension.to_ascii_lowercase()),
        supported: supported_list(),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());

    info!(file = %name, size, mime_type, "File validated");

    Ok(FileValidation {
        valid: true,
        size,
        mime_type: mime_type.to_string(),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_valid_markdown() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.md", b"# Runbook\n");

        let result = validate(&path).unwrap();
        assert!(result.valid);
        assert_eq!(result.size, 10);
        assert_eq!(result.mime_type, "text/markdown");
        assert_eq!(result.name, "notes.md");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "REPORT.PDF", b"%PDF-1.7");
        assert_eq!(validate(&path).unwrap().mime_type, "application/pdf");
    }

    #[test]
    fn test_hwp_types() {
        assert_eq!(mime_type_for("hwp"), Some("application/x-hwp"));
        assert_eq!(mime_type_for("hwpx"), Some("application/x-hwp-v5"));
        assert_eq!(mime_type_for("docx"), None);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = validate(&dir.path().join("absent.pdf")).unwrap_err();
        assert!(matches!(err, AppError::FileNotFound { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = validate(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::NotAFile { .. }));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "setup.exe", b"MZ");

        match validate(&path).unwrap_err() {
            AppError::UnsupportedFileType {
                extension,
                supported,
            } => {
                assert_eq!(extension, ".exe");
                assert!(supported.contains(".hwpx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "Makefile", b"all:");
        assert!(matches!(
            validate(&path).unwrap_err(),
            AppError::UnsupportedFileType { .. }
        ));
    }

    #[test]
    fn test_oversized_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.pdf");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE_BYTES + 1).unwrap();

        let err = validate(&path).unwrap_err();
        assert!(matches!(
            err,
            AppError::PayloadTooLarge {
                limit: MAX_FILE_SIZE_BYTES,
                ..
            }
        ));
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edge.txt");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE_BYTES).unwrap();

        assert_eq!(validate(&path).unwrap().size, MAX_FILE_SIZE_BYTES);
    }

    #[test]
    fn test_size_checked_before_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.bin");
        let file = File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE_BYTES + 1).unwrap();

        assert!(matches!(
            validate(&path).unwrap_err(),
            AppError::PayloadTooLarge { .. }
        ));
    }
}
