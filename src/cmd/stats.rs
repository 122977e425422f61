use crate::reports;
use clap::Args;
use gyeolgu::reference::ReferenceCatalog;
use gyeolgu::store::SessionStore;
use std::process;
use std::sync::Arc;
use tracing::error;

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(short = 'c', long)]
    pub character: Option<String>,

    /// One row per catalog character
    #[arg(long, default_value_t = false)]
    pub per_character: bool,
}

pub fn run(args: StatsArgs, catalog: &ReferenceCatalog, store: Arc<dyn SessionStore>) {
    let mut rows = Vec::new();
    let overall = store.aggregate(args.character.as_deref());
    match overall {
        Ok(s) => rows.push((args.character.clone().unwrap_or_else(|| "*".to_string()), s)),
        Err(e) => {
            error!("❌ {}", e);
            process::exit(1);
        }
    }

    if args.per_character && args.character.is_none() {
        for c in catalog.iter() {
            match store.aggregate(Some(&c.id)) {
                Ok(s) if s.count > 0 => rows.push((c.id.clone(), s)),
                Ok(_) => {}
                Err(e) => {
                    error!("❌ {}", e);
                    process::exit(1);
                }
            }
        }
    }

    reports::print_stats(&rows);
}
