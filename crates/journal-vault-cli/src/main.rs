//! Journal vault CLI
//!
//! Drives the encryption layer against a local JSON store:
//! - Enable encryption for a user
//! - Write encrypted entries, read them back
//! - Report and run migration of legacy entries

mod file_store;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use file_store::FileRemoteStore;
use journal_vault::{
    JournalEncryptionAdapter, JournalRecord, MigrationStatus, RemoteStore, SensitiveFieldBundle,
    VaultConfig, VaultController,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "journal-vault")]
#[command(about = "Client-side journal encryption tool", long_about = None)]
struct Cli {
    /// Store file
    #[arg(short, long, default_value = "journal-store.json")]
    store: PathBuf,

    /// User id
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Vault config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enable encryption: generate the salt and derive the key
    Setup {
        /// Vault password
        #[arg(short, long, env = "JOURNAL_VAULT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show vault and migration status
    Status,

    /// Encrypt and store a new entry
    Encrypt {
        /// Vault password
        #[arg(short, long, env = "JOURNAL_VAULT_PASSWORD", hide_env_values = true)]
        password: String,

        /// Sensitive fields as JSON
        #[arg(short, long)]
        fields: String,

        /// Entry id (random if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Store an unencrypted entry, as written before encryption existed
    Import {
        /// Sensitive fields as JSON
        #[arg(short, long)]
        fields: String,

        /// Entry id (random if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Print entries with sensitive fields decrypted
    Decrypt {
        /// Vault password
        #[arg(short, long, env = "JOURNAL_VAULT_PASSWORD", hide_env_values = true)]
        password: String,

        /// Only this entry
        #[arg(long)]
        id: Option<String>,
    },

    /// Encrypt every legacy entry in place
    Migrate {
        /// Vault password
        #[arg(short, long, env = "JOURNAL_VAULT_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

struct Session {
    store: Arc<FileRemoteStore>,
    adapter: JournalEncryptionAdapter,
}

impl Session {
    async fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => VaultConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => VaultConfig::default(),
        };
        let store = Arc::new(FileRemoteStore::open(&cli.store)?);
        let session = Self::new(store, cli.user.clone(), config);
        session.adapter.vault().check_status().await?;
        Ok(session)
    }

    fn new(store: Arc<FileRemoteStore>, user: String, config: VaultConfig) -> Self {
        let vault = Arc::new(VaultController::new(user, store.clone(), config));
        Self {
            store,
            adapter: JournalEncryptionAdapter::new(vault),
        }
    }

    async fn setup(&self, password: &str) -> anyhow::Result<()> {
        if !self.adapter.vault().setup_encryption(password).await? {
            bail!("vault locked during setup; salt saved, unlock with the password to continue");
        }
        info!(user = %self.user(), "Encryption enabled");
        Ok(())
    }

    async fn unlock(&self, password: &str) -> anyhow::Result<()> {
        if !self.adapter.vault().unlock_with_password(password).await? {
            bail!("wrong password");
        }
        Ok(())
    }

    fn user(&self) -> &str {
        self.adapter.vault().user_id()
    }
}

fn parse_fields(json: &str) -> anyhow::Result<SensitiveFieldBundle> {
    let fields: SensitiveFieldBundle =
        serde_json::from_str(json).context("fields must be a JSON object")?;
    fields.validate()?;
    Ok(fields)
}

fn new_record(session: &Session, id: Option<String>, fields: SensitiveFieldBundle) -> JournalRecord {
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    JournalRecord::new(id, session.user(), fields)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let session = Session::open(&cli).await?;

    match cli.command {
        Commands::Setup { password } => session.setup(&password).await?,
        Commands::Status => {
            let status = session.adapter.vault().status();
            let records = session.store.fetch_records(session.user()).await?;
            let migration = MigrationStatus::scan(&records);
            println!("state:              {:?}", status.state);
            println!("encryption enabled: {}", status.encryption_enabled);
            println!("needs migration:    {}", status.needs_migration);
            println!(
                "entries:            {} ({} encrypted, {} legacy)",
                migration.total, migration.encrypted, migration.legacy
            );
        }
        Commands::Encrypt {
            password,
            fields,
            id,
        } => {
            let fields = parse_fields(&fields)?;
            session.unlock(&password).await?;
            let record = new_record(&session, id, fields);
            let entry = session.adapter.encrypt_entry(&record)?;
            session.store.insert_record(entry.sanitized_entry)?;
            println!("{}", record.id);
        }
        Commands::Import { fields, id } => {
            let record = new_record(&session, id, parse_fields(&fields)?);
            session.store.insert_record(record.clone())?;
            println!("{}", record.id);
        }
        Commands::Decrypt { password, id } => {
            session.unlock(&password).await?;
            let mut records = session.store.fetch_records(session.user()).await?;
            if let Some(id) = id {
                records.retain(|r| r.id == id);
                if records.is_empty() {
                    bail!("no entry {}", id);
                }
            }
            let decrypted = session.adapter.decrypt_entries(&records);
            println!("{}", serde_json::to_string_pretty(&decrypted)?);
        }
        Commands::Migrate { password } => {
            session.unlock(&password).await?;
            let records = session.store.fetch_records(session.user()).await?;
            let report = session.adapter.migrate_entries(&records).await;
            println!(
                "migrated {}, already encrypted {}, failed {}",
                report.migrated.len(),
                report.already_encrypted.len(),
                report.failed.len()
            );
            for (id, reason) in &report.failed {
                println!("  {}: {}", id, reason);
            }
            if !report.failed.is_empty() {
                bail!("{} entries left unmigrated", report.failed.len());
            }
        }
    }

    session.adapter.vault().lock();
    Ok(())
}
