use crate::reports;
use clap::Args;
use gyeolgu::reference::{Difficulty, ReferenceCatalog};

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Only characters of this tier (beginner, intermediate, advanced)
    #[arg(short, long)]
    pub difficulty: Option<Difficulty>,
}

pub fn run(args: CatalogArgs, catalog: &ReferenceCatalog) {
    let chars: Vec<_> = catalog
        .iter()
        .filter(|c| args.difficulty.map_or(true, |d| c.difficulty == d))
        .cloned()
        .collect();
    reports::print_catalog(&chars);
}
