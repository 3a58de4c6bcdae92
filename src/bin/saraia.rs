//! CLI for Saraia - repaint room photos with Gemini.

use clap::{Args, Parser, Subcommand, ValueEnum};
use saraia::repaint::prompt::build_instruction;
use saraia::{
    GeminiModel, GeminiProvider, ImageRepaintClient, PartSelection, RepaintProvider, SourceImage,
    ZoneDirective,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saraia")]
#[command(about = "Repaint walls, ceilings and doors in a room photo via Gemini")]
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
    /// Repaint a photo
    Paint(PaintArgs),

    /// Print the instruction text for a set of zones without calling the API
    Prompt(PromptArgs),

    /// Check that the API key and model are accepted
    Check(ConnectionArgs),
}

#[derive(Args)]
struct ConnectionArgs {
    /// Gemini API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model to use
    #[arg(short, long, value_enum, default_value = "nano-banana")]
    model: ModelArg,

    /// API root override (e.g. a proxy)
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(Args)]
struct PaintArgs {
    /// Photo to repaint
    input: PathBuf,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Zone directive as zone=color, repeatable (order is kept)
    #[arg(short, long = "zone", value_name = "ZONE=COLOR")]
    zones: Vec<ZoneDirective>,

    /// Take the first image part of the response instead of strictly the first part
    #[arg(long)]
    scan_parts: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args)]
struct PromptArgs {
    /// Zone directive as zone=color, repeatable (order is kept)
    #[arg(short, long = "zone", value_name = "ZONE=COLOR")]
    zones: Vec<ZoneDirective>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    NanoBanana,
    NanoBananaPro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::NanoBanana => GeminiModel::NanoBanana,
            ModelArg::NanoBananaPro => GeminiModel::NanoBananaPro,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Paint(args) => paint(args, cli.json).await?,
        Commands::Prompt(args) => print_prompt(args, cli.json)?,
        Commands::Check(args) => check(args, cli.json).await?,
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_provider(args: &ConnectionArgs, selection: PartSelection) -> anyhow::Result<GeminiProvider> {
    let mut builder = GeminiProvider::builder()
        .api_key(&args.api_key)
        .model(args.model.into())
        .timeout(Duration::from_secs(args.timeout_secs))
        .part_selection(selection);
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url);
    }
    Ok(builder.build()?)
}

async fn paint(args: PaintArgs, json_output: bool) -> anyhow::Result<()> {
    if args.zones.is_empty() {
        tracing::warn!("no --zone given; the model only gets the role line");
    }

    let selection = if args.scan_parts {
        PartSelection::FirstImage
    } else {
        PartSelection::First
    };
    let provider = build_provider(&args.connection, selection)?;
    let client = ImageRepaintClient::new(provider)?;

    let photo = SourceImage::from_path(&args.input)?;
    tracing::info!(
        input = %args.input.display(),
        zones = args.zones.len(),
        "submitting photo"
    );

    let image = client.repaint(photo, args.zones).await?;
    image.save(&args.output)?;

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": args.output.display().to_string(),
            "format": image.format().extension(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Repainted image: {} via {}",
            args.output.display(),
            client.provider_name()
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

fn print_prompt(args: PromptArgs, json_output: bool) -> anyhow::Result<()> {
    let instruction = build_instruction(&args.zones);
    if json_output {
        let result = serde_json::json!({
            "zones": args.zones,
            "instruction": instruction,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{instruction}");
    }
    Ok(())
}

async fn check(args: ConnectionArgs, json_output: bool) -> anyhow::Result<()> {
    let provider = build_provider(&args, PartSelection::default())?;
    let outcome = provider.health_check().await;

    if json_output {
        let result = serde_json::json!({
            "provider": provider.name(),
            "model": provider.model().as_str(),
            "ok": outcome.is_ok(),
            "error": outcome.as_ref().err().map(|e| e.kind()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if outcome.is_ok() {
        println!("✓ {} ({})", provider.name(), provider.model().as_str());
    }

    outcome?;
    Ok(())
}
