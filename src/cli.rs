use crate::config::{Config, RankDirection, load_config};
use crate::ir::{DiagramType, LayoutRequest};
use crate::layout::{LayoutEngine, LayoutResult};
use crate::layout_dump::write_layout_dump;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dlay", version, about = "Archetype diagram layout (JSON graph in, JSON layout out)")]
pub struct Args {
    /// Input graph JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file with optional layout/engine/separation/scoring sections
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Override the archetype declared in the input (flow, tree, timeline, cycle, matrix)
    #[arg(short = 't', long = "diagramType")]
    pub diagram_type: Option<String>,

    /// Canvas width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Canvas height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Rank direction for the layered pass (TB or LR)
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<String>,

    /// Iteration level: 1 skips the aesthetic optimizer
    #[arg(long = "iterations")]
    pub iterations: Option<u8>,

    /// Seed for tie-breaking nudges
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Write single-line JSON instead of pretty output
    #[arg(long = "compact")]
    pub compact: bool,

    /// Also write a flat geometry dump to this path
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = build_config(&args)?;

    let input = read_input(args.input.as_deref())?;
    let mut request: LayoutRequest =
        serde_json::from_str(&input).context("input is not a valid layout request")?;
    if let Some(token) = args.diagram_type.as_deref() {
        request.diagram_type = DiagramType::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("unknown diagram type `{token}`"))?;
    }

    let engine = LayoutEngine::new(config);
    let result = engine.layout(&request);
    if !result.success {
        tracing::warn!(error = result.error.as_deref().unwrap_or(""), "layout reported failure");
    }

    write_output(&result, args.output.as_deref(), args.compact)?;
    if let Some(path) = args.dump_layout.as_deref() {
        write_layout_dump(path, &result, &request, engine.config())?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.layout.width = width;
    }
    if let Some(height) = args.height {
        config.layout.height = height;
    }
    if let Some(token) = args.direction.as_deref() {
        config.layout.rank_direction = RankDirection::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("unknown rank direction `{token}`"))?;
    }
    if let Some(level) = args.iterations {
        config.engine.iteration_level = level;
    }
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }
    config.layout.validate()?;
    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(result: &LayoutResult, output: Option<&Path>, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(result)?
    } else {
        serde_json::to_string_pretty(result)?
    };
    match output {
        Some(path) => std::fs::write(path, format!("{json}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}
