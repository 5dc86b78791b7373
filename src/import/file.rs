//! File-level preconditions
//!
//! Checked before any row is parsed. A failure rejects the whole file.

use crate::error::ImportError;
use crate::import::csv::CsvTable;
use crate::import::types::RecordKind;
use tracing::debug;

/// An uploaded CSV file
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    pub contents: String,
    /// Declared size in bytes, as reported by the uploader
    pub size: u64,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        let contents = contents.into();
        Self {
            name: name.into(),
            size: contents.len() as u64,
            contents,
        }
    }

    /// Override the size reported for the file
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Read a file from disk
    pub fn read(path: &std::path::Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, contents))
    }
}

/// Size and row ceilings for one record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_bytes: u64,
    pub max_rows: Option<usize>,
    pub required_columns: &'static [&'static str],
}

impl ImportLimits {
    pub const USERS: ImportLimits = ImportLimits {
        max_bytes: 2 * 1024 * 1024,
        max_rows: Some(100),
        required_columns: &["name", "email"],
    };

    pub const ROLES: ImportLimits = ImportLimits {
        max_bytes: 10 * 1024 * 1024,
        max_rows: None,
        required_columns: &["role_name"],
    };

    pub const fn for_kind(kind: RecordKind) -> ImportLimits {
        match kind {
            RecordKind::User => Self::USERS,
            RecordKind::Role => Self::ROLES,
        }
    }
}

/// Run every precondition and tokenize the file.
///
/// Order: extension, declared size, header present, required columns,
/// row ceiling.
pub(crate) fn open(file: &ImportFile, kind: RecordKind) -> Result<CsvTable, ImportError> {
    let limits = ImportLimits::for_kind(kind);

    if !file.name.to_lowercase().ends_with(".csv") {
        return Err(ImportError::UnsupportedFileType {
            kind,
            file: file.name.clone(),
        });
    }

    if file.size > limits.max_bytes {
        return Err(ImportError::FileTooLarge {
            kind,
            file: file.name.clone(),
            size: file.size,
            limit: limits.max_bytes,
        });
    }

    let table = CsvTable::parse(&file.contents).ok_or_else(|| ImportError::EmptyFile {
        kind,
        file: file.name.clone(),
    })?;

    if let Some(column) = limits
        .required_columns
        .iter()
        .find(|column| !table.has_column(column))
    {
        return Err(ImportError::MissingColumn {
            kind,
            file: file.name.clone(),
            column: column.to_string(),
        });
    }

    if let Some(limit) = limits.max_rows
        && table.records.len() > limit
    {
        return Err(ImportError::TooManyRows {
            kind,
            file: file.name.clone(),
            rows: table.records.len(),
            limit,
        });
    }

    debug!(
        file = %file.name,
        kind = %kind,
        rows = table.records.len(),
        "File passed preconditions"
    );
    Ok(table)
}
