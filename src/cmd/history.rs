use crate::reports;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Args;
use gyeolgu::store::{SessionQuery, SessionStore};
use std::process;
use std::sync::Arc;
use tracing::error;

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(short = 'c', long)]
    pub character: Option<String>,

    /// First day to include (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}

fn day_start(d: NaiveDate) -> Option<chrono::DateTime<Utc>> {
    d.and_hms_opt(0, 0, 0).map(|t| Utc.from_utc_datetime(&t))
}

pub fn run(args: HistoryArgs, store: Arc<dyn SessionStore>) {
    let mut query = SessionQuery::all().page(args.offset, args.limit);
    query.character_id = args.character.clone();
    query.from = args.from.and_then(day_start);
    // `to` is a whole day, so the window ends at the next midnight
    query.to = args.to.and_then(|d| d.succ_opt()).and_then(day_start);

    match store.query(&query) {
        Ok(sessions) => reports::print_history(&sessions),
        Err(e) => {
            error!("❌ {}", e);
            process::exit(1);
        }
    }
}
