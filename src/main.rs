use anyhow::{Context, Result};
use apigraph::cache::SemanticCache;
use apigraph::graph::GraphBuilder;
use apigraph::ingest::{expand_inputs, read_many};
use apigraph::semantic::OpenAiSemanticService;
use apigraph::{augment, detect_flows, export, Config, ExportFormat, SemanticService};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "apigraph")]
#[command(about = "Build a tool/parameter data-flow graph from recorded API calls")]
struct Args {
    /// CSV files or directories searched recursively for *.csv
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Output file (default: graph.<format extension>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export format: json, graphml, dot or neo4j
    #[arg(short, long, default_value = "json")]
    export: ExportFormat,

    /// Detect name-based flows between tools
    #[arg(long)]
    detect_flows: bool,

    /// Minimum similarity for fuzzy flows (0.0 to 1.0)
    #[arg(long)]
    fuzzy_threshold: Option<f64>,

    /// Only link identical parameter paths
    #[arg(long)]
    no_fuzzy: bool,

    /// Ask an LLM for flows between differently named parameters
    #[arg(long)]
    semantic_matching: bool,

    /// Config file (overrides APIGRAPH_CONFIG and ./apigraph.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::load_from(path)?
        }
        None => Config::load()?,
    };

    if args.detect_flows {
        config.flows.enabled = true;
    }
    if let Some(threshold) = args.fuzzy_threshold {
        config.flows.fuzzy_threshold = threshold;
    }
    if args.no_fuzzy {
        config.flows.fuzzy_enabled = false;
    }
    if args.semantic_matching {
        config.semantic.enabled = true;
    }
    config.validate().context("Invalid command-line options")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let level = if args.verbose { "debug" } else { config.apigraph.log_level.as_str() };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", level)).init();

    let start = Instant::now();
    log::info!("Starting apigraph");

    let files = expand_inputs(&args.input);
    log::info!("Found {} CSV file(s)", files.len());
    let records = read_many(&files);
    if records.is_empty() {
        anyhow::bail!("No API records found in {} input file(s)", files.len());
    }

    let mut graph = GraphBuilder::new().build(&records);

    if config.flows.enabled {
        detect_flows(&mut graph, &config.flows.options());
    }

    if config.semantic.enabled {
        let service = OpenAiSemanticService::from_config(&config.semantic)
            .context("Failed to set up semantic service")?;
        if let Some(service) = &service {
            log::info!("Semantic matching with {} at {}", service.model(), service.endpoint());
        }
        let cache = SemanticCache::new(config.semantic.cache_capacity);
        let report = augment(
            &mut graph,
            service.as_ref().map(|s| s as &dyn SemanticService),
            &cache,
            &config.semantic.options(),
        )
        .await;
        log::info!(
            "Semantic matching: {} candidates, {} cached, {} requests, {} edges",
            report.candidate_pairs,
            report.cache_hits,
            report.requests,
            report.edges_added
        );
        log::debug!(
            "Semantic cache: {} entries, {} hits, {} misses",
            cache.len(),
            cache.hits(),
            cache.misses()
        );
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("graph.{}", args.export.extension())));
    export(&graph, args.export, &output).with_context(|| format!("Failed to export to {}", output.display()))?;

    let stats = graph.stats();
    log::info!(
        "Done in {:?}: {} tools, {} parameters, {} io edges, {} flow edges, {} semantic edges (density {:.4})",
        start.elapsed(),
        stats.tool_nodes,
        stats.parameter_nodes,
        stats.io_edges,
        stats.flow_edges,
        stats.semantic_edges,
        stats.density
    );
    Ok(())
}
