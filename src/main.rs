use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use gyeolgu::config::Config;
use gyeolgu::reference::ReferenceCatalog;
use gyeolgu::store::{JsonlStore, SessionStore};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Reference catalog JSON; the built-in set when omitted
    #[arg(global = true, long)]
    catalog: Option<String>,

    #[arg(global = true, short, long, default_value = "data/sessions.jsonl")]
    store: String,

    /// Tuning JSON; explicit flags override its values
    #[arg(global = true, long)]
    config: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Evaluate(cmd::evaluate::EvaluateArgs),
    History(cmd::history::HistoryArgs),
    Stats(cmd::stats::StatsArgs),
    Catalog(cmd::catalog::CatalogArgs),
}

fn load_catalog(path: Option<&str>) -> ReferenceCatalog {
    match path {
        Some(p) => ReferenceCatalog::load_from_file(p).unwrap_or_else(|e| {
            error!("❌ Failed to load catalog '{}': {}", p, e);
            process::exit(1);
        }),
        None => ReferenceCatalog::builtin(),
    }
}

fn open_store(path: &str) -> Arc<dyn SessionStore> {
    match JsonlStore::open(path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("❌ Session store '{}' unavailable: {}", path, e);
            process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    match cli.command {
        Commands::Evaluate(ref args) => {
            let Some(sub_matches) = matches.subcommand_matches("evaluate") else {
                error!("❌ Missing evaluate arguments");
                process::exit(2);
            };

            let config = match &cli.config {
                Some(path) => {
                    info!("⚙️  Loading config from: {}", path);
                    let mut file_config = Config::load_from_file(path).unwrap_or_else(|e| {
                        error!("❌ {}", e);
                        process::exit(1);
                    });
                    file_config.merge_from_cli(&args.config, sub_matches);
                    file_config
                }
                None => {
                    if cli.debug {
                        warn!("⚠️  No config file given. Using embedded defaults.");
                    }
                    args.config.clone()
                }
            };

            let catalog = Arc::new(load_catalog(cli.catalog.as_deref()));
            let store = open_store(&cli.store);
            cmd::evaluate::run(args.clone(), config, catalog, store, cli.debug);
        }
        Commands::History(args) => {
            let store = open_store(&cli.store);
            cmd::history::run(args, store);
        }
        Commands::Stats(args) => {
            let catalog = load_catalog(cli.catalog.as_deref());
            let store = open_store(&cli.store);
            cmd::stats::run(args, &catalog, store);
        }
        Commands::Catalog(args) => {
            let catalog = load_catalog(cli.catalog.as_deref());
            cmd::catalog::run(args, &catalog);
        }
    }
}
