use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use qrious_core::{
    extract_url, render_analysis, render_resolution, AnalysisResult, AnalyzerConfig,
    DomainClassifier, DomainListRepository, DomainLists, FileListRepository, OutputFormat,
    UrlAnalyzer, Verdict,
};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "qrious",
    author,
    version,
    about = "Expand QR-code URLs and score how trustworthy the destination is"
)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); `QRIOUS_*` env vars override it
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory containing domain lists (shorteners.txt, suspicious_tlds.txt,
    /// trusted_domains.txt, patterns.json)
    #[arg(
        long = "lists-dir",
        value_name = "DIR",
        default_value = "./lists",
        global = true
    )]
    lists_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Human, global = true)]
    format: Format,

    /// Maximum number of redirects to follow
    #[arg(long = "max-depth", value_name = "N", global = true)]
    max_depth: Option<usize>,

    /// Per-request timeout, e.g. `5s` or `1500ms`
    #[arg(long, value_name = "DURATION", global = true)]
    timeout: Option<humantime::Duration>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow redirects and print the chain without scoring
    Expand {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Follow redirects, then score the final destination
    Analyze {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Analyze the URL inside a decoded QR payload (argument or stdin)
    Scan {
        payload: Option<String>,
    },
    /// Print the active domain lists
    ListDomains,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Human,
    Json,
    Yaml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Human => OutputFormat::Human,
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format);
    match &cli.command {
        Commands::Expand { urls } => {
            let analyzer = build_analyzer(&cli).await?;
            for url in urls {
                let resolution = analyzer.expand(url).await;
                print!("{}", render_resolution(&resolution, format)?);
            }
        }
        Commands::Analyze { urls } => {
            let analyzer = build_analyzer(&cli).await?;
            for url in urls {
                let result = analyzer.analyze(url).await;
                print_analysis(url, &result, format)?;
            }
        }
        Commands::Scan { payload } => {
            let payload = match payload {
                Some(payload) => payload.clone(),
                None => read_stdin().await?,
            };
            let url = extract_url(&payload).context("QR payload does not contain a web URL")?;
            let analyzer = build_analyzer(&cli).await?;
            let result = analyzer.analyze(&url).await;
            print_analysis(&url, &result, format)?;
        }
        Commands::ListDomains => {
            let lists = load_lists(&cli.lists_dir).await?;
            print_lists(&cli.lists_dir, &lists, format)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = &cli.config {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("QRIOUS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let mut analyzer_config: AnalyzerConfig = builder
        .build()
        .context("failed to load configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    analyzer_config.intel = analyzer_config.intel.with_env_fallback();
    if let Some(max_depth) = cli.max_depth {
        analyzer_config.resolver.max_depth = max_depth;
    }
    if let Some(timeout) = cli.timeout {
        let timeout: std::time::Duration = timeout.into();
        analyzer_config.resolver.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }
    Ok(analyzer_config)
}

async fn load_lists(lists_dir: &Path) -> Result<DomainLists> {
    let repo = FileListRepository::new(lists_dir);
    DomainListRepository::load_lists(&repo)
        .await
        .with_context(|| format!("failed to load domain lists from {}", lists_dir.display()))
}

async fn build_analyzer(cli: &Cli) -> Result<UrlAnalyzer> {
    let config = load_config(cli)?;
    let lists = load_lists(&cli.lists_dir).await?;
    let domains = DomainClassifier::new(lists).context("domain lists failed validation")?;
    tracing::debug!(
        max_depth = config.resolver.max_depth,
        timeout_ms = config.resolver.timeout_ms,
        cache = config.cache.enabled,
        safe_browsing = config.intel.safe_browsing_enabled(),
        virustotal = config.intel.virustotal_enabled(),
        "analyzer configured"
    );
    UrlAnalyzer::from_config(&config, domains)
}

async fn read_stdin() -> Result<String> {
    let mut payload = String::new();
    tokio::io::stdin()
        .read_to_string(&mut payload)
        .await
        .context("failed to read QR payload from stdin")?;
    Ok(payload)
}

fn print_analysis(input: &str, result: &AnalysisResult, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Human) {
        println!("{} {}", verdict_badge(result.verdict), input);
    }
    print!("{}", render_analysis(result, format)?);
    Ok(())
}

fn verdict_badge(verdict: Verdict) -> colored::ColoredString {
    let label = format!("[{}]", verdict.as_str().to_uppercase());
    match verdict {
        Verdict::Safe => label.green().bold(),
        Verdict::Suspicious => label.yellow().bold(),
        Verdict::Dangerous => label.red().bold(),
    }
}

fn print_lists(lists_dir: &Path, lists: &DomainLists, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(lists)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(lists)?),
        OutputFormat::Human => {
            println!("Domain lists from {}", lists_dir.display());
            print_section("Shorteners", &lists.shorteners);
            print_section("Suspicious TLDs", &lists.suspicious_tlds);
            print_section("Trusted domains", &lists.trusted_domains);
            println!("\nPatterns ({}):", lists.patterns.len());
            for pattern in &lists.patterns {
                println!(
                    "- {id:<20} {pattern} :: {desc}",
                    id = pattern.id,
                    pattern = pattern.pattern,
                    desc = pattern.description
                );
            }
        }
    }
    Ok(())
}

fn print_section(title: &str, entries: &[String]) {
    println!("\n{title} ({}):", entries.len());
    for entry in entries {
        println!("- {entry}");
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
