use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};
use grantscout_cache::CacheManager;
use grantscout_core::{
    config::Config,
    display,
    export::{ExportFormat, Exporter, CSV_MIME_TYPE},
    providers::ScrapeProvider,
    GrantFetcher, GrantSearch, Notice, ResultSource, SearchMode, SearchSession,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod shell;

#[derive(Parser)]
#[command(name = "grantscout")]
#[command(version, about = "Find grant funding opportunities by keyword or URL", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/grantscout/config.toml)
    #[arg(long, global = true, env = "GRANTSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG wins when set)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Search for grants
    Search(SearchArgs),
    /// Interactive search session
    Shell {
        /// Starting search mode
        #[arg(short, long, default_value = "keywords")]
        mode: SearchMode,

        /// Skip the query cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or clear the query cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Search terms (one per argument) or the URL to scrape; "-" reads stdin
    #[arg(required = true)]
    query: Vec<String>,

    /// keywords or url
    #[arg(short, long, default_value = "keywords")]
    mode: SearchMode,

    /// Skip the query cache
    #[arg(long)]
    no_cache: bool,

    /// Scrape API base URL (overrides config and GRANTSCOUT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Save the results after searching
    #[arg(short, long)]
    export: bool,

    /// Export destination (default: quantilytix-grants-<date>.<ext>)
    #[arg(short, long, requires = "export")]
    output: Option<PathBuf>,

    /// Export format (default: from --output extension, else csv)
    #[arg(long, value_enum, requires = "export")]
    format: Option<FormatArg>,
}

#[derive(clap::Subcommand)]
enum CacheAction {
    /// List cached queries
    List,
    /// Entry and record counts
    Stats,
    /// Delete every cached query
    Clear,
    /// Print the cache database path
    Path,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FormatArg {
    Csv,
    Json,
}

impl FormatArg {
    pub(crate) fn from_extension(ext: &str) -> Option<Self> {
        ExportFormat::from_extension(ext).map(Self::from)
    }
}

impl From<ExportFormat> for FormatArg {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Csv => FormatArg::Csv,
            ExportFormat::Json => FormatArg::Json,
        }
    }
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match cli.command {
        Some(Commands::Search(args)) => run_search(config, args).await,
        Some(Commands::Shell { mode, no_cache }) => {
            let search = build_search(&config, no_cache)?;
            shell::run(&search, &config, mode).await
        }
        Some(Commands::Cache { action }) => run_cache(&config, action),
        Some(Commands::Config { action }) => run_config(&config, &config_path, action),
        None => {
            println!("No command specified. Try --help");
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for results
fn init_logging(verbose: u8) {
    let default_filter = if verbose > 0 {
        "grantscout=debug"
    } else {
        "grantscout=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Wire the scrape client, fetcher and (unless disabled) the query cache
fn build_search(config: &Config, no_cache: bool) -> anyhow::Result<GrantSearch> {
    let provider =
        ScrapeProvider::from_config(&config.api).context("Failed to set up scrape API client")?;
    let fetcher = GrantFetcher::new(Box::new(provider));

    if no_cache || !config.cache.enabled {
        tracing::debug!("Query cache disabled");
        return Ok(GrantSearch::new(fetcher));
    }

    let path = config.cache.resolved_path()?;
    match CacheManager::new(&path) {
        Ok(cache) => Ok(GrantSearch::with_cache(fetcher, Arc::new(cache))),
        Err(e) => {
            tracing::warn!(
                "Query cache at {} unavailable ({}), searching without it",
                path.display(),
                e
            );
            Ok(GrantSearch::new(fetcher))
        }
    }
}

/// Keyword arguments are separate terms; URL arguments are one URL
fn query_from_args(mode: SearchMode, parts: &[String]) -> anyhow::Result<String> {
    if parts.len() == 1 && parts[0] == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read query from stdin")?;
        return Ok(input);
    }

    Ok(match mode {
        SearchMode::Keywords => parts.join("\n"),
        SearchMode::Url => parts.join(" "),
    })
}

pub(crate) fn print_notice(notice: &Notice) {
    match notice {
        Notice::Info(msg) => println!("{}", msg),
        Notice::Warning(msg) => eprintln!("warning: {}", msg),
        Notice::Error(msg) => eprintln!("error: {}", msg),
    }
}

async fn run_search(mut config: Config, args: SearchArgs) -> anyhow::Result<()> {
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }

    let query = query_from_args(args.mode, &args.query)?;
    let search = build_search(&config, args.no_cache)?;
    let mut session = SearchSession::new(args.mode);

    tracing::info!("Searching ({}) for: {:?}", args.mode, query.trim());
    let notice = session.submit(&search, &query).await;

    if !session.results().is_empty() {
        println!("{}", display::render_results(session.results()));
        if session.last_source() == Some(ResultSource::Cache) {
            eprintln!("({} grants from cache)", session.results().len());
        }
    }

    match notice {
        Some(Notice::Error(msg)) | Some(Notice::Warning(msg)) => bail!(msg),
        Some(info) => print_notice(&info),
        None => {}
    }

    if args.export {
        export_session(&session, &config, args.output, args.format)?;
    }

    Ok(())
}

/// Save what the session is showing. An empty list is a warning, not an error.
pub(crate) fn export_session(
    session: &SearchSession,
    config: &Config,
    output: Option<PathBuf>,
    format: Option<FormatArg>,
) -> anyhow::Result<()> {
    let format = resolve_format(format, output.as_deref());
    let path = match output {
        Some(path) => path,
        None => {
            let dir = config
                .export
                .directory
                .clone()
                .unwrap_or_else(|| PathBuf::from("."));
            let today = chrono::Utc::now().date_naive();
            dir.join(Exporter::default_filename(
                &config.export.filename_prefix,
                today,
                format,
            ))
        }
    };

    let written = match session.export_to(&path, format) {
        Ok(written) => written,
        Err(e @ grantscout_core::Error::EmptyExport) => {
            print_notice(&Notice::Warning(e.to_string()));
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to export to {}", path.display()))
        }
    };

    match format {
        ExportFormat::Csv => eprintln!(
            "Exported {} grants to {} ({})",
            session.results().len(),
            written.display(),
            CSV_MIME_TYPE
        ),
        ExportFormat::Json => eprintln!(
            "Exported {} grants to {}",
            session.results().len(),
            written.display()
        ),
    }
    Ok(())
}

/// Explicit flag, then the output extension, then CSV
fn resolve_format(format: Option<FormatArg>, output: Option<&Path>) -> ExportFormat {
    format
        .map(ExportFormat::from)
        .or_else(|| {
            output
                .and_then(|p| p.extension())
                .and_then(|e| e.to_str())
                .and_then(ExportFormat::from_extension)
        })
        .unwrap_or_default()
}

fn run_cache(config: &Config, action: CacheAction) -> anyhow::Result<()> {
    let path = config.cache.resolved_path()?;
    if let CacheAction::Path = action {
        println!("{}", path.display());
        return Ok(());
    }

    let cache = CacheManager::new(&path)
        .with_context(|| format!("Failed to open cache at {}", path.display()))?;

    match action {
        CacheAction::List => {
            let entries = cache.entries()?;
            if entries.is_empty() {
                println!("Cache is empty.");
            }
            for entry in entries {
                println!(
                    "{:>5}  {:<8}  {}  {:>4} grants  {}",
                    entry.id,
                    entry.mode,
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.result_count,
                    entry.query.replace('\n', " | ")
                );
            }
        }
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("Entries: {}", stats.entries);
            println!("Grants:  {}", stats.records);
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("Oldest:  {}", oldest.format("%Y-%m-%d %H:%M"));
                println!("Newest:  {}", newest.format("%Y-%m-%d %H:%M"));
            }
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("Removed {} cached queries.", removed);
        }
        CacheAction::Path => {}
    }

    Ok(())
}

fn run_config(config: &Config, config_path: &Path, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => print!("{}", config.to_toml()?),
        ConfigAction::Path => println!("{}", config_path.display()),
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            Config::default().save_to(config_path)?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}
