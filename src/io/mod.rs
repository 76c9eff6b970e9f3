//! Input/output helpers.
//!
//! - dataset + model JSON read/write (`store`)
//! - PDB topology and multi-model trajectory parsing (`pdb`)
//! - per-state CSV exports (`export`)
//!
//! Every write goes through [`write_replacing`], which writes a sibling temp
//! file and renames it over the target so a reader never sees a partial file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub mod export;
pub mod pdb;
pub mod store;

pub use export::*;
pub use pdb::*;
pub use store::*;

/// Write `path` by total replacement.
pub fn write_replacing<F>(path: &Path, write: F) -> Result<(), AppError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), AppError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::write(parent, e))?;
    }

    let tmp = temp_sibling(path);
    let file = File::create(&tmp).map_err(|e| AppError::write(&tmp, e))?;
    let mut writer = BufWriter::new(file);

    let result = write(&mut writer).and_then(|()| writer.flush().map_err(|e| AppError::write(&tmp, e)));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    drop(writer);

    fs::rename(&tmp, path).map_err(|e| AppError::write(path, e))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_write_overwrites_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");

        write_replacing(&path, |w| w.write_all(b"first").map_err(|e| AppError::write("out.txt", e))).unwrap();
        write_replacing(&path, |w| w.write_all(b"second").map_err(|e| AppError::write("out.txt", e))).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn failed_write_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old").unwrap();

        let result = write_replacing(&path, |_| Err(AppError::contract("boom")));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert!(!temp_sibling(&path).exists());
    }
}
