//! VaultGuard - CLI
//!
//! Command-line interface for vault operations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use vaultguard_core::{
    retention, AuditLogger, DocumentMetadata, FilePrefsStore, SecureStorage, SoftwareKeyVault,
};

#[derive(Parser)]
#[command(name = "vaultguard")]
#[command(version = vaultguard_core::VERSION)]
#[command(about = "VaultGuard - Encrypted document vault")]
struct Cli {
    /// Vault path
    #[arg(short, long, default_value = "./vault")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and store a document
    Save {
        /// Logical document name
        name: String,

        /// File to encrypt
        path: PathBuf,

        /// Document type (e.g. PASSPORT, TICKET)
        #[arg(short = 't', long, default_value = "DOCUMENT")]
        doc_type: String,

        /// Human-readable display name
        #[arg(short, long)]
        display_name: Option<String>,
    },

    /// Decrypt a document to a file
    Load {
        /// Logical document name
        name: String,

        /// Output path
        output: PathBuf,
    },

    /// List stored documents
    List,

    /// List documents of one type
    Search {
        /// Document type to match
        doc_type: String,
    },

    /// Delete a document and its metadata
    Delete {
        /// Logical document name
        name: String,
    },

    /// Rotate encryption keys if the rotation interval has elapsed
    Rotate,

    /// Export an encrypted backup archive
    Export {
        /// Archive path (defaults to a timestamped zip in the temp dir)
        output: Option<PathBuf>,
    },

    /// Restore documents from an encrypted backup archive
    Restore {
        /// Archive path
        archive: PathBuf,

        /// Replace documents that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Verify the audit log hash chain
    AuditVerify,

    /// Print the audit log
    AuditShow,

    /// Delete encrypted files older than the retention window
    Retention {
        /// Retention window in days (0 keeps everything)
        #[arg(short, long)]
        days: u32,
    },

    /// Delete every document, key and preference
    Wipe {
        /// Keep the encryption keys in the key vault
        #[arg(long)]
        keep_keys: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn open_storage(vault_dir: &PathBuf) -> Arc<SecureStorage> {
    Arc::new(SecureStorage::new(
        vault_dir.join("storage"),
        Arc::new(SoftwareKeyVault::new(vault_dir.join("keys"))),
        Arc::new(FilePrefsStore::new(vault_dir.join("prefs.json"))),
    ))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let storage = open_storage(&cli.vault);
    let audit = AuditLogger::new(Arc::clone(&storage));

    match cli.command {
        Commands::Save {
            name,
            path,
            doc_type,
            display_name,
        } => {
            let data =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;

            let mut meta = DocumentMetadata::new(&doc_type);
            meta.display_name = display_name;

            let outcome = storage.save_with_metadata(&name, &data, &meta);
            anyhow::ensure!(outcome.blob_saved, "could not store {name}");
            if !outcome.metadata_saved {
                eprintln!("⚠️ Document stored, but its metadata was not");
            }

            audit.append("DOCUMENT_SAVED", event_data(&name, &doc_type))?;
            println!("🔐 Stored {} ({} bytes)", name, data.len());
        }

        Commands::Load { name, output } => {
            let data = storage
                .load(&name)?
                .with_context(|| format!("no document named {name}"))?;
            std::fs::write(&output, &data)
                .with_context(|| format!("writing {}", output.display()))?;

            audit.append("DOCUMENT_LOADED", event_data(&name, ""))?;
            println!("📤 Decrypted {} to {}", name, output.display());
        }

        Commands::List => {
            let names = storage.list();
            if names.is_empty() {
                println!("📭 Vault is empty");
            } else {
                println!("📄 Documents in vault ({}):", names.len());
                println!("{:-<60}", "");
                for name in names {
                    match storage.get_metadata(&name) {
                        Ok(Some(meta)) => {
                            let display = meta.display_name.as_deref().unwrap_or("-");
                            println!("  {name} [{}] {display}", meta.doc_type);
                        }
                        _ => println!("  {name} [no metadata]"),
                    }
                }
            }
        }

        Commands::Search { doc_type } => {
            let names = storage.search_by_type(&doc_type);
            if names.is_empty() {
                println!("📭 No documents of type {doc_type}");
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }

        Commands::Delete { name } => {
            anyhow::ensure!(storage.delete(&name), "could not delete {name}");
            audit.append("DOCUMENT_DELETED", event_data(&name, ""))?;
            println!("🗑️ Deleted {name}");
        }

        Commands::Rotate => {
            let migrated = storage.rotate_if_due(now_ms())?;
            if migrated == 0 {
                println!("🔑 Rotation not due, nothing to do");
            } else {
                audit.append(
                    "KEYS_ROTATED",
                    BTreeMap::from([("migrated".to_string(), migrated.to_string())]),
                )?;
                println!("🔑 Rotated keys, re-encrypted {migrated} file(s)");
            }
        }

        Commands::Export { output } => {
            let archive = storage.export_backup(output.as_deref())?;
            audit.append("BACKUP_EXPORTED", BTreeMap::new())?;
            println!("📦 Backup written to {}", archive.display());
        }

        Commands::Restore { archive, overwrite } => {
            let restored = storage.restore_backup(&archive, overwrite)?;
            audit.append(
                "BACKUP_RESTORED",
                BTreeMap::from([("restored".to_string(), restored.to_string())]),
            )?;
            println!("📦 Restored {restored} file(s)");
        }

        Commands::AuditVerify => {
            if audit.verify() {
                println!("✅ Audit chain intact ({} entries)", audit.read_all().len());
            } else {
                anyhow::bail!("audit chain verification FAILED");
            }
        }

        Commands::AuditShow => {
            let entries = audit.read_all();
            if entries.is_empty() {
                println!("📭 Audit log is empty");
            } else {
                for entry in entries {
                    let data: Vec<String> = entry
                        .data
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    println!("{} {} {}", entry.ts_ms, entry.event_type, data.join(" "));
                }
            }
        }

        Commands::Retention { days } => {
            let deleted =
                retention::apply_retention(storage.storage_dir(), &cli.vault, days, now_ms());
            println!("🧹 Retention sweep deleted {deleted} file(s)");
        }

        Commands::Wipe { keep_keys } => {
            // Audit first: wipe_all removes the audit log's blob too.
            audit.append("VAULT_WIPED", BTreeMap::new())?;
            anyhow::ensure!(
                storage.wipe_all(!keep_keys),
                "some files could not be removed"
            );
            println!("💥 Vault wiped");
        }
    }

    Ok(())
}

fn event_data(name: &str, doc_type: &str) -> BTreeMap<String, String> {
    let mut data = BTreeMap::from([("name".to_string(), name.to_string())]);
    if !doc_type.is_empty() {
        data.insert("type".to_string(), doc_type.to_string());
    }
    data
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
