//! File utility functions.

use crate::error::{HolocronError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively find files with a given extension in a directory.
pub fn find_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(HolocronError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Directory not found: {}", dir.display()),
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            if let Some(ext) = entry.path().extension() {
                if ext == extension {
                    files.push(entry.path().to_path_buf());
                }
            }
        }
    }
    Ok(files)
}

/// Read a SavedVariables file. The WoW client writes UTF-8, but files
/// carried over from old installs occasionally hold legacy Windows-1252
/// bytes, so invalid UTF-8 falls back to a full Windows-1252 decode.
pub fn read_saved_variables(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(err.as_bytes());
            Ok(text.into_owned())
        }
    }
}
