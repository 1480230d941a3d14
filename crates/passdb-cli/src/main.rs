use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};
use passdb_core::active::{load_active, save_active, ActiveStore};
use passdb_core::crypto;
use passdb_core::paths::active_store_cache_path;
use passdb_core::{Item, PassDb};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

const PASSWORD_ENV: &str = "PASSDB_PASSWORD";
const NO_ACTIVE_STORE: &str =
    "there is no passdb loaded - create one with create-pass-db or load one with load-pass-db";

#[derive(Parser, Debug)]
#[command(name = "passdb", author, version, about = "Simple encrypted password manager", long_about = None)]
struct Cli {
    /// Store file to use instead of the active one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Store passphrase (falls back to $PASSDB_PASSWORD, then a prompt)
    #[arg(long, global = true)]
    db_password: Option<String>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new passdb and make it the active one
    CreatePassDb {
        /// Name for the passdb
        #[arg(short, long)]
        name: String,
        /// Path of the new passdb file
        #[arg(short = 'f', long)]
        file_path: PathBuf,
    },

    /// Make an existing passdb the active one
    LoadPassDb {
        #[arg(short = 'f', long)]
        file_path: PathBuf,
    },

    /// Add a new item
    Add {
        name: String,
        #[command(flatten)]
        fields: ItemFields,
    },

    /// Show an item, or a single part of it
    #[command(group(ArgGroup::new("part").args(["username", "password", "notes", "url"])))]
    Get {
        name: String,
        #[arg(short, long)]
        username: bool,
        #[arg(short, long)]
        password: bool,
        #[arg(short, long)]
        notes: bool,
        #[arg(short = 'w', long)]
        url: bool,
    },

    /// List the names of all items
    List,

    /// Change parts of an existing item
    Update {
        name: String,
        #[command(flatten)]
        fields: ItemFields,
    },

    /// Rename an item
    Rename {
        name: String,
        #[arg(short, long)]
        to: String,
    },

    /// Remove an item
    Delete { name: String },

    /// Show the active passdb
    Status,
}

#[derive(Args, Debug)]
struct ItemFields {
    #[arg(short, long)]
    username: Option<String>,
    #[arg(short, long)]
    password: Option<String>,
    /// May be repeated
    #[arg(short, long)]
    notes: Option<Vec<String>>,
    #[arg(short = 'w', long)]
    url: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let Cli {
        db,
        db_password,
        command,
        ..
    } = cli;
    let session = Session { db, db_password };

    match command {
        Commands::CreatePassDb { name, file_path } => {
            let password = resolve_new_password(session.db_password)?;
            let db = PassDb::create(&file_path, &name, &password)
                .with_context(|| format!("failed to create passdb at {}", file_path.display()))?;
            let path = remember_active(db.path(), db.name())?;
            info!(store = %name, "passdb created");
            println!("created new passdb: '{}' at {}", name, path.display());
        }
        Commands::LoadPassDb { file_path } => {
            let password = resolve_password(session.db_password, "Enter passdb password: ")?;
            let db = PassDb::load(&file_path, &password)
                .with_context(|| format!("failed to load passdb at {}", file_path.display()))?;
            let path = remember_active(db.path(), db.name())?;
            println!("loaded passdb '{}' at {}", db.name(), path.display());
        }
        Commands::Add { name, fields } => {
            let mut db = session.open()?;
            let item = Item::new(
                &name,
                fields.username.as_deref().unwrap_or_default(),
                fields.password.as_deref().unwrap_or_default(),
                fields.url.as_deref().unwrap_or_default(),
                fields.notes.unwrap_or_default(),
            )
            .context("cannot add new item to passdb")?;
            db.save_new_item(&item)
                .context("cannot add new item to passdb")?;
            println!("successfully added {name} to the passdb");
        }
        Commands::Get {
            name,
            username,
            password,
            notes,
            url,
        } => {
            let db = session.open()?;
            let item = db
                .retrieve_item(&name)
                .context("cannot retrieve item from passdb")?;
            if username {
                println!("{}", item.username);
            } else if password {
                println!("{}", item.password);
            } else if notes {
                println!("{}", item.notes.join("\n"));
            } else if url {
                println!("{}", item.url);
            } else {
                println!("{}", serde_json::to_string_pretty(&item)?);
            }
        }
        Commands::List => {
            let db = session.open()?;
            for name in db.list_items() {
                println!("{name}");
            }
        }
        Commands::Update { name, fields } => {
            let mut db = session.open()?;
            let mut item = db
                .retrieve_item(&name)
                .context("cannot update item")?;
            if let Some(username) = fields.username {
                item.username = username;
            }
            if let Some(password) = fields.password {
                item.password = password;
            }
            if let Some(notes) = fields.notes {
                item.notes = notes;
            }
            if let Some(url) = fields.url {
                item.url = url;
            }
            db.update_item(&item).context("cannot update item")?;
            println!("updated item: '{name}'");
        }
        Commands::Rename { name, to } => {
            let mut db = session.open()?;
            db.rename_item(&name, &to)
                .with_context(|| format!("cannot rename item {name} to {to}"))?;
            println!("successfully renamed item from: '{name}' to: '{to}'");
        }
        Commands::Delete { name } => {
            let mut db = session.open()?;
            db.delete_item(&name)
                .context("cannot delete item from passdb")?;
            println!("successfully deleted item '{name}' from passdb");
        }
        Commands::Status => {
            let Some(path) = session.store_path()? else {
                println!("{NO_ACTIVE_STORE}");
                return Ok(());
            };
            let db = session.open_at(&path)?;
            let header = crypto::inspect(&fs::read(&path)?)?;
            println!("passdb: {}", db.name());
            println!("path: {}", path.display());
            println!("items: {}", db.item_count());
            if let Some(modified) = db.last_modified() {
                println!("last modified: {}", modified.to_rfc3339());
            }
            println!(
                "kdf: argon2id m={}KiB t={} p={}",
                header.kdf.memory_cost, header.kdf.time_cost, header.kdf.parallelism
            );
        }
    }
    Ok(())
}

struct Session {
    db: Option<PathBuf>,
    db_password: Option<String>,
}

impl Session {
    /// `--db` wins over the cached active store.
    fn store_path(&self) -> Result<Option<PathBuf>> {
        if let Some(db) = &self.db {
            return Ok(Some(db.clone()));
        }
        let cache = active_store_cache_path()?;
        Ok(load_active(&cache)?.map(|active| active.path))
    }

    fn open(&self) -> Result<PassDb> {
        let path = self.store_path()?.ok_or_else(|| anyhow!(NO_ACTIVE_STORE))?;
        self.open_at(&path)
    }

    fn open_at(&self, path: &Path) -> Result<PassDb> {
        let password = resolve_password(self.db_password.clone(), "Enter passdb password: ")?;
        PassDb::load(path, &password)
            .with_context(|| format!("can't load passdb at {}", path.display()))
    }
}

fn remember_active(path: &Path, name: &str) -> Result<PathBuf> {
    let path = fs::canonicalize(path)?;
    let cache = active_store_cache_path()?;
    save_active(
        &cache,
        &ActiveStore {
            path: path.clone(),
            name: Some(name.to_string()),
        },
    )
    .context("failed to update the active passdb cache")?;
    debug!(cache = %cache.display(), "active passdb cache updated");
    Ok(path)
}

fn resolve_password(flag: Option<String>, prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = flag {
        return Ok(Zeroizing::new(pw));
    }
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }
    let pw = rpassword::prompt_password(prompt).map_err(|e| anyhow!("password prompt: {e}"))?;
    Ok(Zeroizing::new(pw))
}

fn resolve_new_password(flag: Option<String>) -> Result<Zeroizing<String>> {
    if flag.is_some() || std::env::var(PASSWORD_ENV).is_ok_and(|pw| !pw.is_empty()) {
        return resolve_password(flag, "");
    }
    let first = resolve_password(None, "Create passdb password: ")?;
    let second = Zeroizing::new(
        rpassword::prompt_password("Confirm password: ")
            .map_err(|e| anyhow!("password prompt: {e}"))?,
    );
    if *first != *second {
        return Err(anyhow!("passwords do not match"));
    }
    Ok(first)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
