//! VaultGuard Core - Encrypted Backup Export/Restore
//!
//! Packages the encrypted file directory into a flat zip and restores it
//! verbatim. Entries stay in their on-disk envelope format: no decryption
//! happens on either path, so a backup is exactly as confidential as the
//! vault directory itself.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::VaultResult;
use crate::storage::{BLOB_SUFFIX, META_SUFFIX};

fn is_vault_entry(name: &str) -> bool {
    name.ends_with(BLOB_SUFFIX) || name.ends_with(META_SUFFIX)
}

/// Zip every `.vgenc`/`.vgmeta` file in `src_dir` into `dest`, preserving
/// file names as entry names so any storage instance with the same directory
/// convention can restore them.
pub fn export_encrypted_backup(src_dir: &Path, dest: &Path) -> VaultResult<PathBuf> {
    if dest.exists() {
        fs::remove_file(dest)?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    if src_dir.exists() {
        let mut paths: Vec<PathBuf> = fs::read_dir(src_dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(is_vault_entry)
            })
            .collect();
        paths.sort();

        for path in paths {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            zip.start_file(name, options)?;
            zip.write_all(&fs::read(&path)?)?;
        }
    }

    zip.finish()?;
    Ok(dest.to_path_buf())
}

/// Extract matching-suffix entries of `zip_path` into `dest_dir`. Existing
/// files are skipped unless `overwrite`. Returns the number restored. A
/// missing archive restores nothing.
pub fn restore_encrypted_backup(
    zip_path: &Path,
    dest_dir: &Path,
    overwrite: bool,
) -> VaultResult<usize> {
    if !zip_path.exists() {
        return Ok(0);
    }
    fs::create_dir_all(dest_dir)?;

    let mut archive = ZipArchive::new(File::open(zip_path)?)?;
    let mut restored = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        // Flat archive: strip any path component an untrusted zip may carry.
        let name = match Path::new(entry.name())
            .file_name()
            .and_then(|n| n.to_str())
        {
            Some(n) if is_vault_entry(n) => n.to_string(),
            _ => continue,
        };

        let out_path = dest_dir.join(&name);
        if out_path.exists() && !overwrite {
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        fs::write(&out_path, &data)?;
        restored += 1;
    }

    Ok(restored)
}
