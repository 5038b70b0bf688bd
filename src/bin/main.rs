use aurachat::app::App;
use aurachat::backend::MemoryStore;
use aurachat::config::Config;
use aurachat::utils::{get_config_dir, initialize_panic_handler};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::{env, fs};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Headless client for AuraChat operators.
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch chats for message changes and log updates until interrupted.
    Watch {
        /// Email to sign in with.
        #[arg(short, long)]
        email: Option<String>,
        /// Chat ids to watch.
        #[arg(short = 'w', long = "chat")]
        chats: Vec<i64>,
    },
    /// List the chats of an account.
    Chats { account_id: String },
    /// Trigger a message sync for one chat.
    Sync { account_id: String, chat_id: String },
    /// Generate an AI reply draft for one chat.
    Draft { account_id: String, chat_id: String },
}

impl Args {
    fn config_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config {
            Ok(path.clone())
        } else {
            Self::default_config_path()
        }
    }
    fn default_config_path() -> Result<PathBuf> {
        let config_dir = get_config_dir()?;
        fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("aurachat.config.toml"))
    }
}

fn init_logger() {
    let mut builder = env_logger::Builder::from_default_env();
    if env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = if args.config_path()?.exists() {
        toml::from_str(&fs::read_to_string(args.config_path()?)?)?
    } else {
        Config::default()
    };

    init_logger();

    initialize_panic_handler()?;

    let mut app = App::new(config);
    match args.command {
        Command::Watch { email, chats } => app.watch(MemoryStore::new(), email, chats).await,
        Command::Chats { account_id } => app.chats(&account_id).await,
        Command::Sync {
            account_id,
            chat_id,
        } => app.sync(&account_id, &chat_id).await,
        Command::Draft {
            account_id,
            chat_id,
        } => app.draft(&account_id, &chat_id).await,
    }
}
