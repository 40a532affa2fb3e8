//! CLI entry point for the listing search engine.
//!
//! Commands import scraped listings, build the vector index, and run
//! searches with the same filter parameters the web front end sends.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use inmofinder::config::models_dir;
use inmofinder::display::{
    THEME, TableBuilder, create_results_table, create_status_table, with_spinner,
};
use inmofinder::io::{ExitCode, JsonResponse, ResponseMeta};
use inmofinder::search::CandidateSource;
use inmofinder::storage::import_listings;
use inmofinder::vector::{LazyEmbeddingGenerator, encode_with_timeout, rank};
use inmofinder::{
    IndexCache, MemoryRecordStore, RecordStore, SearchError, SearchOrchestrator, SearchQuery,
    Settings, VectorIndexStore,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic search for property listings
#[derive(Parser)]
#[command(
    name = "inmofinder",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search for property listings",
    next_line_help = true,
    styles = clap_cargo_style(),
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log progress at info level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .inmofinder/settings.toml with defaults
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display the effective settings
    Config,

    /// Import scraped listings from a JSON file
    Import {
        /// File holding one listing object or an array of them
        file: PathBuf,
    },

    /// Load or build the vector index
    Index {
        /// Rebuild even if a valid snapshot exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show record count, cache state and snapshot metadata
    Status,

    /// Rank listings by similarity only, with scores
    Similar {
        text: String,

        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,
    },

    /// Search listings with optional free text and filters
    #[command(
        after_help = "Examples:\n  inmofinder search \"casa con piscina\" --price-max 900000000\n  inmofinder search --type apartamento --rooms 3 --sort price_asc\n  inmofinder search --query \"q=finca&pets=1&page=2\""
    )]
    Search {
        /// Free text, ranked semantically when the index is available
        text: Option<String>,

        #[arg(long)]
        price_min: Option<String>,
        #[arg(long)]
        price_max: Option<String>,
        #[arg(long)]
        area_min: Option<String>,
        #[arg(long)]
        area_max: Option<String>,
        #[arg(long)]
        rooms: Option<String>,
        #[arg(long)]
        bathrooms: Option<String>,
        #[arg(long)]
        parking_spaces: Option<String>,

        /// Property type, matched case-insensitively
        #[arg(long = "type")]
        property_type: Option<String>,

        /// Only listings with at least one parking space
        #[arg(long)]
        garage: bool,
        #[arg(long)]
        pets: bool,
        #[arg(long)]
        furnished: bool,

        /// price_asc, price_desc, area_asc, area_desc or recent
        #[arg(long)]
        sort: Option<String>,

        #[arg(long, default_value = "1")]
        page: String,
        #[arg(long)]
        page_size: Option<String>,

        /// Raw URL query string; its parameters are applied after the flags
        #[arg(long)]
        query: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", THEME.error_with_icon(&format!("{e:#}")));
            std::process::exit(ExitCode::ConfigError.into());
        }
    };
    init_tracing(&settings, cli.verbose);

    let json = cli.json;
    let code = match run(cli.command, &settings, json) {
        Ok(code) => code,
        Err(e) => report_error(&e, json),
    };
    std::process::exit(code.into());
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            if let Err(warning) = Settings::check_init() {
                debug!("{warning}");
            }
            Settings::load().context("Failed to load configuration")
        }
    }
}

fn init_tracing(settings: &Settings, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(error: &anyhow::Error, json: bool) -> ExitCode {
    match error.downcast_ref::<SearchError>() {
        Some(search_err) => {
            if json {
                let response = JsonResponse::from_error(search_err);
                match serde_json::to_string_pretty(&response) {
                    Ok(out) => println!("{out}"),
                    Err(e) => eprintln!("Failed to serialize error: {e}"),
                }
            } else {
                eprintln!("{}", THEME.error_with_icon(&search_err.to_string()));
                for suggestion in search_err.recovery_suggestions() {
                    eprintln!("  {}", THEME.apply(&THEME.dim, suggestion));
                }
            }
            ExitCode::from_error(search_err)
        }
        None => {
            eprintln!("{}", THEME.error_with_icon(&format!("{error:#}")));
            ExitCode::GeneralError
        }
    }
}

fn run(command: Commands, settings: &Settings, json: bool) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("Failed to create configuration")?;
            println!(
                "{}",
                THEME.success_with_icon(&format!(
                    "Created configuration file at {}",
                    path.display()
                ))
            );
            Ok(ExitCode::Success)
        }

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(settings).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(ExitCode::Success)
        }

        Commands::Import { file } => run_import(settings, &file, json),
        Commands::Index { force } => run_index(settings, force, json),
        Commands::Status => run_status(settings, json),
        Commands::Similar { text, top_k } => run_similar(settings, &text, top_k, json),

        Commands::Search {
            text,
            price_min,
            price_max,
            area_min,
            area_max,
            rooms,
            bathrooms,
            parking_spaces,
            property_type,
            garage,
            pets,
            furnished,
            sort,
            page,
            page_size,
            query,
        } => {
            let flag = |on: bool| on.then(|| "1".to_string());
            let mut params: Vec<(String, String)> = [
                ("q", text),
                ("price_min", price_min),
                ("price_max", price_max),
                ("area_min", area_min),
                ("area_max", area_max),
                ("rooms", rooms),
                ("bathrooms", bathrooms),
                ("parking_spaces", parking_spaces),
                ("type", property_type),
                ("garage", flag(garage)),
                ("pets", flag(pets)),
                ("furnished", flag(furnished)),
                ("sort", sort),
                ("page", Some(page)),
                ("page_size", page_size),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();

            if let Some(raw) = query {
                params.extend(SearchQuery::parse_pairs(&raw)?);
            }

            let query = SearchQuery::from_params(params, &settings.search)?;
            run_search(settings, &query, json)
        }
    }
}

fn open_records(settings: &Settings) -> Result<Arc<MemoryRecordStore>, SearchError> {
    let path = settings.records_file();
    debug!(path = %path.display(), "Opening record store");
    Ok(Arc::new(MemoryRecordStore::from_json_file(&path)?))
}

fn open_cache(
    settings: &Settings,
    records: Arc<dyn RecordStore>,
    show_progress: bool,
) -> Result<IndexCache, SearchError> {
    let semantic = &settings.semantic_search;
    let encoder =
        LazyEmbeddingGenerator::new(&semantic.model, models_dir())?.with_progress(show_progress);
    let store = VectorIndexStore::new(settings.index_dir(), semantic.model.clone());

    Ok(IndexCache::new(
        store,
        records,
        Arc::new(encoder),
        Arc::new(Mutex::new(())),
    )
    .with_batch_size(semantic.batch_size))
}

fn print_json<T: Serialize>(response: &JsonResponse<T>) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(response).context("Failed to serialize output")?
    );
    Ok(())
}

fn run_import(settings: &Settings, file: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let records = open_records(settings)?;
    let report = import_listings(file, &records).map_err(SearchError::from)?;
    records
        .save_json(&settings.records_file())
        .map_err(SearchError::from)?;

    let message = format!(
        "Imported {} listings ({} skipped), {} records in store",
        report.imported,
        report.skipped,
        records.len()
    );
    if json {
        print_json(&JsonResponse::success(&report).with_message(message))?;
    } else {
        println!("{}", THEME.success_with_icon(&message));
        if report.imported > 0 {
            println!(
                "{}",
                THEME.apply(
                    &THEME.dim,
                    "The vector index is not refreshed automatically; run 'inmofinder index --force'"
                )
            );
        }
    }
    Ok(ExitCode::Success)
}

#[derive(Serialize)]
struct IndexSummary {
    embeddings: usize,
    dimension: usize,
    generation: Option<String>,
    elapsed_ms: u64,
}

fn run_index(settings: &Settings, force: bool, json: bool) -> anyhow::Result<ExitCode> {
    let records = open_records(settings)?;
    let cache = open_cache(settings, records, !json)?;

    let started = Instant::now();
    let index = if json {
        cache.get_or_build(force)?
    } else {
        with_spinner("Preparing vector index", || cache.get_or_build(force))?
    };

    let summary = IndexSummary {
        embeddings: index.len(),
        dimension: index.dimension().get(),
        generation: cache.store_status().generation,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    if json {
        print_json(&JsonResponse::success(summary))?;
    } else {
        println!(
            "{}",
            THEME.success_with_icon(&format!(
                "Index ready: {} embeddings, dimension {} ({} ms)",
                summary.embeddings, summary.dimension, summary.elapsed_ms
            ))
        );
    }
    Ok(ExitCode::Success)
}

#[derive(Serialize)]
struct StatusInfo {
    records: usize,
    cache_state: String,
    index_path: PathBuf,
    snapshot_present: bool,
    generation: Option<String>,
    model_name: Option<String>,
    embeddings: Option<usize>,
    dimension: Option<usize>,
}

fn run_status(settings: &Settings, json: bool) -> anyhow::Result<ExitCode> {
    let records = open_records(settings)?;
    let count = records.len();
    let cache = open_cache(settings, records, false)?;
    let status = cache.store_status();

    if json {
        let info = StatusInfo {
            records: count,
            cache_state: cache.state().to_string(),
            index_path: status.path.clone(),
            snapshot_present: status.present,
            generation: status.generation.clone(),
            model_name: status.metadata.as_ref().map(|m| m.model_name.clone()),
            embeddings: status.metadata.as_ref().map(|m| m.embedding_count),
            dimension: status.metadata.as_ref().map(|m| m.dimension),
        };
        print_json(&JsonResponse::success(info))?;
    } else {
        println!("{}", create_status_table(&status, cache.state(), count));
    }
    Ok(ExitCode::Success)
}

#[derive(Serialize)]
struct SimilarHit {
    id: u32,
    score: f32,
    title: Option<String>,
}

fn run_similar(
    settings: &Settings,
    text: &str,
    top_k: usize,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let records = open_records(settings)?;
    let cache = open_cache(settings, records.clone(), !json)?;
    let semantic = &settings.semantic_search;

    let index = cache.get_or_build_within(false, semantic.build_timeout())?;
    let query = encode_with_timeout(cache.encoder(), text, semantic.encode_timeout())
        .map_err(SearchError::from)?;
    let ranked = rank(&query, index.ids(), index.vectors(), top_k).map_err(SearchError::from)?;

    let hits: Vec<SimilarHit> = ranked
        .iter()
        .map(|candidate| SimilarHit {
            id: candidate.id.value(),
            score: candidate.score,
            title: records.get(candidate.id).and_then(|r| r.title),
        })
        .collect();

    if json {
        print_json(&JsonResponse::success(hits))?;
    } else if hits.is_empty() {
        println!("{}", THEME.warning_with_icon("No listings in the index"));
    } else {
        let table = hits
            .into_iter()
            .fold(
                TableBuilder::new().set_headers(vec!["Id", "Score", "Title"]),
                |table, hit| {
                    table.add_row(vec![
                        hit.id.to_string(),
                        format!("{:.3}", hit.score),
                        hit.title.unwrap_or_else(|| "(untitled)".to_string()),
                    ])
                },
            )
            .build();
        println!("{table}");
    }
    Ok(ExitCode::Success)
}

fn run_search(settings: &Settings, query: &SearchQuery, json: bool) -> anyhow::Result<ExitCode> {
    let started = Instant::now();
    let records = open_records(settings)?;

    let cache = if settings.semantic_search.enabled && query.text.is_some() {
        match open_cache(settings, records.clone(), false) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "Semantic search unavailable");
                None
            }
        }
    } else {
        None
    };

    let orchestrator = SearchOrchestrator::from_settings(settings, records, cache);
    let (page, source) = orchestrator.search_explained(query)?;

    if json {
        let meta = ResponseMeta::now(Some(started.elapsed().as_millis() as u64));
        let message = format!("{} results via {:?}", page.total_count, source);
        print_json(
            &JsonResponse::success(&page)
                .with_message(message)
                .with_meta(meta),
        )?;
        return Ok(ExitCode::Success);
    }

    if source == CandidateSource::Keyword {
        eprintln!(
            "{}",
            THEME.warning_with_icon("Semantic ranking unavailable, showing keyword matches")
        );
    }
    if page.is_empty() {
        println!("{}", THEME.warning_with_icon("No listings match this search"));
    } else {
        println!("{}", create_results_table(&page));
    }
    println!(
        "{}",
        THEME.apply(
            &THEME.dim,
            format!(
                "Page {} of {} ({} results)",
                page.page, page.num_pages, page.total_count
            )
        )
    );
    Ok(ExitCode::Success)
}
