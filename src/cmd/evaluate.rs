use crate::reports;
use clap::Args;
use gyeolgu::cancel::NeverCancel;
use gyeolgu::config::Config;
use gyeolgu::engine::Engine;
use gyeolgu::error::{EngineError, GyResult};
use gyeolgu::guide::GuideGeometry;
use gyeolgu::raster::InkImage;
use gyeolgu::reference::ReferenceCatalog;
use gyeolgu::store::SessionStore;
use std::fs;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub config: Config,

    /// Captured image (PGM/PPM)
    #[arg(short, long)]
    pub image: String,

    #[arg(short = 'c', long)]
    pub character: String,

    /// Guide overlay JSON, in image pixels
    #[arg(short, long)]
    pub guide: Option<String>,

    /// Print the result as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

fn load_guide(path: &str) -> GyResult<GuideGeometry> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn user_message(e: &EngineError) -> &'static str {
    match e {
        EngineError::Extraction(_) => "다시 촬영해 주세요 (retake photo)",
        EngineError::Alignment(_) => "다른 글자이거나 획을 알아보기 어렵습니다",
        _ => "평가를 진행할 수 없습니다",
    }
}

pub fn run(
    args: EvaluateArgs,
    config: Config,
    catalog: Arc<ReferenceCatalog>,
    store: Arc<dyn SessionStore>,
    debug: bool,
) {
    let engine = Engine::new(catalog, config, store).unwrap_or_else(|e| {
        error!("❌ {}", e);
        process::exit(1);
    });

    info!("📷 Loading capture: {}", args.image);
    let image = InkImage::load_pnm(&args.image).unwrap_or_else(|e| {
        error!("❌ {}", e);
        process::exit(1);
    });

    let guide = args.guide.as_deref().map(|p| {
        load_guide(p).unwrap_or_else(|e| {
            error!("❌ Guide '{}': {}", p, e);
            process::exit(1);
        })
    });

    if debug {
        if let Ok(strokes) = engine.extract(&image, guide.as_ref(), &NeverCancel) {
            reports::print_strokes(&strokes);
        }
    }

    let evaluation = match engine.evaluate(
        &image,
        &args.character,
        guide.as_ref(),
        &args.image,
        &NeverCancel,
    ) {
        Ok(ev) => ev,
        Err(e) => {
            error!("❌ {}", e);
            eprintln!("{}", user_message(&e));
            process::exit(1);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&evaluation.result) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                error!("❌ {}", e);
                process::exit(1);
            }
        }
    } else {
        reports::print_evaluation(&evaluation.result);
    }

    match &evaluation.session {
        Ok(id) => info!("💾 Saved as session {}", id),
        Err(e) => {
            warn!("⚠️  Result not saved, retry: {}", e);
            process::exit(3);
        }
    }
}
