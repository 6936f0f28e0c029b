mod ai;
mod artifact;
mod config;
mod error;
mod fragment;
mod text_stage;
mod video;
mod video_stage;

#[cfg(test)]
mod testing;

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use ai::{Backend, OpenAi};
use config::Config;
use video::FfmpegRenderer;

#[derive(Parser)]
#[command(name = "reelsmith")]
#[command(about = "Turn a topic into a narrated, captioned video using OpenAI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    stage: Stage,
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide = true, global = true)]
    api_key: Option<String>,
    /// Directory holding GenAI/, audio/, images/ and videos/
    #[arg(short, long, default_value = ".", hide = true, global = true)]
    work_dir: PathBuf,
}

#[derive(Subcommand)]
enum Stage {
    /// Ask for a topic and save the generated text to GenAI/generated_text.txt
    Text,
    /// Render GenAI/generated_text.txt into GenAI/final_video.mp4
    Video,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let api_key = cli
        .api_key
        .context("OpenAI API key not found, set OPENAI_API_KEY or pass --api-key")?;
    let config = Config::new(api_key, cli.work_dir);
    debug!("working directory: {}", config.layout.root().display());
    let backend = OpenAi::new(&config.api_key, config.models.clone());

    let result = match cli.stage {
        Stage::Text => generate_text(&config, &backend).await,
        Stage::Video => generate_video(&config, &backend).await,
    };
    if let Err(err) = result {
        let code = report(&err);
        if code != 0 {
            std::process::exit(code);
        }
    }
    Ok(())
}

/// Logs a stage failure and returns the exit status. An empty prompt is not a failure.
fn report(err: &error::Error) -> i32 {
    match err {
        error::Error::EmptyInput => {
            warn!("{err}");
            0
        }
        _ => {
            error!("{err}");
            1
        }
    }
}

async fn generate_text(config: &Config, backend: &dyn Backend) -> error::Result<PathBuf> {
    let prompt = text_stage::read_prompt(&mut io::stdin().lock(), &mut io::stdout())?;
    text_stage::run(config, backend, &prompt).await
}

async fn generate_video(config: &Config, backend: &dyn Backend) -> error::Result<PathBuf> {
    let renderer = FfmpegRenderer::new(config.render.clone())?;
    video_stage::run(config, backend, &renderer).await
}
