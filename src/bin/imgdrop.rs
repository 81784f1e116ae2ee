//! CLI for imgdrop - prompt-to-image generation with automatic download.

use clap::{Args, Parser, Subcommand};
use imgdrop::{delivery, page, GenerationSession, SessionState, Settings, SynthesisService};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgdrop")]
#[command(about = "Generate an image from a text prompt and save it automatically")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Check that the configured endpoint accepts the API token
    Health,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Directory the image is saved into
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Also write an HTML page with the image and download directives
    #[arg(long)]
    html: Option<PathBuf>,

    /// Do not save the image file (only useful with --html)
    #[arg(long)]
    no_save: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imgdrop=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Generate(args) => generate(args, &settings, cli.json).await,
        Commands::Health => health(&settings, cli.json).await,
    }
}

async fn generate(args: GenerateArgs, settings: &Settings, json_output: bool) -> anyhow::Result<()> {
    let provider = settings.provider()?;
    let mut session = GenerationSession::new(provider).with_narrator(settings.narrator());

    let mut progress = session.progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let msg = progress.borrow_and_update().clone();
            if !msg.is_empty() {
                eprintln!("{msg}");
            }
        }
    });

    if !args.prompt.trim().is_empty() {
        eprintln!("Generating image...");
    }
    let state = session.submit(&args.prompt).await;

    let mut saved = None;
    if state == SessionState::Succeeded && !args.no_save {
        if let Some(artifact) = session.artifact() {
            match delivery::save_to_dir(artifact, &args.out_dir) {
                Ok(path) => saved = Some(path),
                Err(e) => {
                    tracing::error!("saving artifact failed: {e}");
                    anyhow::bail!(e.user_message());
                }
            }
        }
    }

    if let Some(ref html_path) = args.html {
        let html = page::render_result_page(&args.prompt, &state, session.output());
        std::fs::write(html_path, html)?;
    }

    let filename = session.artifact().map(|a| a.filename.clone());
    let dims = session.image().map(|i| (i.width(), i.height()));
    drop(session);
    printer.await.ok();

    match state {
        SessionState::Succeeded => {
            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "filename": filename,
                    "output": saved.as_ref().map(|p| p.display().to_string()),
                    "html": args.html.as_ref().map(|p| p.display().to_string()),
                    "width": dims.map(|d| d.0),
                    "height": dims.map(|d| d.1),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Image generated!");
                if let Some(path) = saved {
                    println!("Saved: {}", path.display());
                }
                if let Some(path) = args.html {
                    println!("Page: {}", path.display());
                }
            }
            Ok(())
        }
        SessionState::Failed(failure) => {
            if json_output {
                let result = serde_json::json!({
                    "success": false,
                    "error": failure.kind.to_string(),
                    "message": failure.message,
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            anyhow::bail!(failure.message)
        }
        other => anyhow::bail!("generation did not finish: {other:?}"),
    }
}

async fn health(settings: &Settings, json_output: bool) -> anyhow::Result<()> {
    let provider = settings.provider()?;
    let result = provider.health_check().await;

    if json_output {
        let value = serde_json::json!({
            "service": provider.name(),
            "endpoint": provider.endpoint(),
            "healthy": result.is_ok(),
            "error": result.as_ref().err().map(|e| e.kind().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let status = if result.is_ok() { "✓" } else { "✗" };
        println!("{} {} ({})", status, provider.name(), provider.endpoint());
    }

    if let Err(e) = result {
        tracing::error!("health check failed: {e}");
        anyhow::bail!(e.user_message());
    }
    Ok(())
}
