use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use softvault::admin::{CategoryForm, UploadForm};
use softvault::app::{App, CategoryFilter, TunnelChange};
use softvault::config::Config;
use softvault::relay::{Suggestion, SuggestionRelay};
use softvault::session::SessionStorage;
use softvault::storage::{BackendKind, LocalStore, SoftwareItem, Storage, StorageError};
use softvault::util::{pad_to_width, strip_control_chars, MAX_SEARCH_TERM_LENGTH};

/// Get the config directory path (~/.config/softvault/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("softvault"))
}

#[derive(Parser, Debug)]
#[command(name = "softvault", about = "Software catalog with remote or local storage")]
struct Args {
    /// Delete local storage and start again from seed data
    #[arg(long)]
    reset_local: bool,

    /// Admin key, required for admin commands
    #[arg(long, value_name = "KEY")]
    admin_key: Option<String>,

    /// Config file (default: ~/.config/softvault/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog items (default)
    List {
        /// Match against titles and tags, case-insensitive
        #[arg(long, short)]
        search: Option<String>,
        /// Category id, or "all"
        #[arg(long, short)]
        category: Option<String>,
    },
    /// List categories
    Categories,
    /// Show where an item downloads from
    Download { id: String },
    /// Send a suggestion to the admins
    Suggest {
        #[arg(long)]
        username: String,
        #[arg(long)]
        proposal: String,
        #[arg(long, default_value = "")]
        utility: String,
    },
    /// Cycle the theme and print each step
    Theme {
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },

    // Admin commands
    /// Add an item to the catalog
    Upload {
        #[arg(long)]
        title: Option<String>,
        /// Fill title, file name and size from a local file
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        version: Option<String>,
        /// Category id (default: first category)
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "")]
        size: String,
    },
    /// Import the latest file from the private channel
    ImportTelegram,
    /// Delete an item
    Delete { id: String },
    /// Add a category
    CategoryAdd {
        name: String,
        #[arg(long, default_value = "folder")]
        icon: String,
    },
    /// Delete a category (its items become uncategorized)
    CategoryDelete { id: String },
    /// Create a secure link for an item, or revoke the active one
    Tunnel { id: String },
    /// Show bot settings
    Bot,
}

impl Command {
    fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::Upload { .. }
                | Self::ImportTelegram
                | Self::Delete { .. }
                | Self::CategoryAdd { .. }
                | Self::CategoryDelete { .. }
                | Self::Tunnel { .. }
                | Self::Bot
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access to the directory holding local storage
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(?config, "Configuration resolved");

    let db_path = config_dir.join("local.db");
    if args.reset_local && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete local storage")?;
        println!("Local storage reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in local storage path"))?;
    let local = match LocalStore::open(db_path_str).await {
        Ok(local) => local,
        Err(StorageError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of softvault appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open local storage: {}", e)),
    };

    let client = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(30))
        .build()?;

    let storage = Storage::new(config.storage_mode(), local, client.clone())
        .context("Invalid remote store configuration")?;

    let mut app = App::new(
        Arc::new(storage),
        SessionStorage::new(),
        config.initial_theme(),
    );

    let command = args.command.unwrap_or(Command::List {
        search: None,
        category: None,
    });

    if command.requires_admin() {
        let Some(key) = args.admin_key.as_deref() else {
            bail!("This command needs --admin-key");
        };
        if !app.login(key) {
            bail!("Invalid admin key");
        }
        if app.storage().backend() == BackendKind::Local {
            eprintln!("Note: remote store not configured, changes stay on this machine.");
        }
    }

    app.refresh().await;

    let result = run(&mut app, command, &config, client).await;

    if let Some(msg) = app.take_status() {
        eprintln!("{}", msg);
    }
    result
}

async fn run(
    app: &mut App,
    command: Command,
    config: &Config,
    client: reqwest::Client,
) -> Result<()> {
    match command {
        Command::List { search, category } => {
            let search = search.unwrap_or_default();
            if search.len() > MAX_SEARCH_TERM_LENGTH {
                bail!(
                    "Search term too long (max {} bytes)",
                    MAX_SEARCH_TERM_LENGTH
                );
            }
            app.set_search_term(search);
            app.select_category(CategoryFilter::from_arg(category.as_deref()));
            print_items(app);
        }
        Command::Categories => {
            for cat in app.categories.iter() {
                println!(
                    "{} {} {}",
                    pad_to_width(&strip_control_chars(&cat.id), 20),
                    pad_to_width(&strip_control_chars(&cat.name), 24),
                    strip_control_chars(&cat.icon)
                );
            }
        }
        Command::Download { id } => {
            let Some(item) = app.items.iter().find(|i| i.id == id) else {
                bail!("No item with id {}", id);
            };
            if App::is_placeholder_download(item) && !item.has_secure_link() {
                eprintln!("No download location published for this item yet.");
            }
            println!("{}", strip_control_chars(App::download_target(item)));
        }
        Command::Suggest {
            username,
            proposal,
            utility,
        } => {
            let relay = SuggestionRelay::new(
                client,
                &config.relay.api_base,
                config.relay_token(),
                config.relay.chat_id.clone(),
            )
            .context("Invalid relay configuration")?;
            let suggestion = Suggestion {
                username,
                proposal,
                utility,
            };
            if !app.send_suggestion(&relay, &suggestion).await {
                if let Some(msg) = app.take_status() {
                    eprintln!("{}", msg);
                }
                std::process::exit(1);
            }
        }
        Command::Theme { steps } => {
            println!("{}", app.theme.name());
            for _ in 0..steps {
                println!("{}", app.cycle_theme());
            }
        }
        Command::Upload {
            title,
            file,
            description,
            version,
            category,
            tags,
            size,
        } => {
            let mut form = UploadForm::for_categories(&app.categories);
            if let Some(path) = &file {
                let meta = std::fs::metadata(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?;
                form.fill_from_file(name, meta.len());
            }
            if let Some(title) = title {
                form.title = title;
            }
            if form.title.trim().is_empty() {
                bail!("Upload needs --title or --file");
            }
            if let Some(version) = version {
                form.version = version;
            }
            if let Some(category) = category {
                form.category_id = category;
            }
            form.description = description;
            form.tags = tags;
            if !size.is_empty() {
                form.size = size;
            }

            if let Some(item) = app.upload(form).await? {
                println!("Uploaded {} ({})", item.title, item.id);
            }
        }
        Command::ImportTelegram => {
            println!("Fetching latest file from private channel...");
            if let Some(item) = app.import_from_telegram().await? {
                println!("Imported {} ({})", item.title, item.id);
            }
        }
        Command::Delete { id } => {
            if app.delete_item(&id).await? {
                println!("Deleted {}", id);
            }
        }
        Command::CategoryAdd { name, icon } => {
            if let Some(cat) = app.add_category(CategoryForm { name, icon }).await? {
                println!("Added category {} ({})", cat.name, cat.id);
            }
        }
        Command::CategoryDelete { id } => {
            if app.delete_category(&id).await? {
                println!("Deleted category {}", id);
            }
        }
        Command::Tunnel { id } => {
            match app.toggle_tunnel(&id, |line| println!("{}", line)).await? {
                TunnelChange::Created(url) => println!("Secure link active: {}", url),
                TunnelChange::Revoked => println!("Secure link revoked for {}", id),
                TunnelChange::Unchanged => {}
            }
        }
        Command::Bot => {
            let cfg = app.telegram_config().await?;
            println!("Bot:       @{}", cfg.bot_name);
            println!("Admin IDs: {}", cfg.admin_ids.join(", "));
            println!("Token:     {}", mask_token(&cfg.bot_token));
        }
    }
    Ok(())
}

fn print_items(app: &App) {
    let visible = app.filtered_items();
    if visible.is_empty() {
        println!("No items found.");
        return;
    }

    println!(
        "{} {} {} {} {} TAGS",
        pad_to_width("ID", 14),
        pad_to_width("TITLE", 32),
        pad_to_width("CATEGORY", 16),
        pad_to_width("VERSION", 12),
        pad_to_width("SIZE", 10),
    );
    for item in visible {
        println!("{}", item_row(app, item));
    }
}

fn item_row(app: &App, item: &SoftwareItem) -> String {
    let mut title = strip_control_chars(&item.title).into_owned();
    if item.has_secure_link() {
        title.push_str(" [secure]");
    }
    format!(
        "{} {} {} {} {} {}",
        pad_to_width(&item.id, 14),
        pad_to_width(&title, 32),
        pad_to_width(&strip_control_chars(app.category_name(item)), 16),
        pad_to_width(&strip_control_chars(&item.version), 12),
        pad_to_width(&strip_control_chars(&item.size), 10),
        strip_control_chars(&item.tags.join(", ")),
    )
}

/// Show only the bot id part of a token, e.g. `1234567890:****`.
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{}:****", bot_id),
        None => "****".to_string(),
    }
}
