use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use netintent::orchestrator::{compile_file, load_renderer, CompileOptions, DEFAULT_WORKERS};
use netintent::render::TemplateMap;
use netintent::routing::RdScope;
use std::path::PathBuf;

/// Compile a network intent document into per-router configurations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the intent document (YAML or JSON)
    intent: PathBuf,

    /// Output directory for configurations and the model dump
    #[arg(short, long, default_value = "configs")]
    output: PathBuf,

    /// Directory of .tera templates overriding the built-in ones
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Number of render workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Route-distinguisher numbering: per-edge or global
    #[arg(long, default_value = "per-edge")]
    rd_scope: RdScope,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Intent file: {:?}", args.intent);
    info!("Output directory: {:?}", args.output);

    let options = CompileOptions {
        output_dir: args.output.clone(),
        templates_dir: args.templates.clone(),
        workers: args.workers.max(1),
        rd_scope: args.rd_scope,
        templates: TemplateMap::default(),
    };

    let renderer = load_renderer(&options).wrap_err("Failed to load templates")?;
    let report = compile_file(&args.intent, &options, &renderer)
        .wrap_err_with(|| format!("Failed to compile '{}'", args.intent.display()))?;

    for (hostname, path) in &report.written {
        info!("{} -> {}", hostname, path.display());
    }

    if !report.is_success() {
        let failed: Vec<&str> = report.failed.keys().map(String::as_str).collect();
        return Err(eyre!(
            "{} of {} devices failed to render: {}",
            failed.len(),
            failed.len() + report.written.len(),
            failed.join(", ")
        ));
    }

    info!("Configuration generation completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["netintent", "intent.yaml"]);

        assert_eq!(args.intent, PathBuf::from("intent.yaml"));
        assert_eq!(args.output, PathBuf::from("configs"));
        assert_eq!(args.workers, 4);
        assert_eq!(args.rd_scope, RdScope::PerEdge);
        assert!(args.templates.is_none());
    }

    #[test]
    fn test_rd_scope_flag() {
        let args = Args::parse_from([
            "netintent",
            "intent.json",
            "--rd-scope",
            "global",
            "--workers",
            "8",
            "-o",
            "out",
        ]);

        assert_eq!(args.rd_scope, RdScope::Global);
        assert_eq!(args.workers, 8);
        assert_eq!(args.output, PathBuf::from("out"));
    }
}
