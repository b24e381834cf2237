//! Command-line front end for the Resonote reading library.
//!
//! Every command prints one JSON document to stdout; diagnostics go to the
//! configured log sink.

use clap::{Args, Parser, Subcommand};
use log::warn;
use resonote_core::db::Connection;
use resonote_core::source::ReqwestHttpClient;
use resonote_core::{
    init_logging, init_stderr_logging, open_db_with_options, AppConfig, ArticleId,
    ArticleListQuery, IngestPipeline, LibraryService, ReadingStatus, ReflectionError,
    ReflectionService, SourceContext, SourceCredentials, SourceOptions, SourceRegistry,
    SqliteLibraryRepository, SqliteReflectionRepository,
};
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "resonote", version, about = "Ingest, curate and read articles")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "RESONOTE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides `db_path`).
    #[arg(long, env = "RESONOTE_DB", value_name = "FILE")]
    db: Option<PathBuf>,

    /// Log level (overrides `log_level`).
    #[arg(long, env = "RESONOTE_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, curate and store one batch from a source.
    Ingest {
        /// Registered source name (`guardian`, `reddit`, `webpage`).
        source: String,
        #[arg(long, default_value_t = 5)]
        max_count: usize,
        /// Adapter option as `key=value`; repeatable.
        #[arg(long = "opt", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },
    /// List stored articles, newest first.
    List(ListArgs),
    /// Tag usage counts.
    Tags,
    MarkRead {
        id: ArticleId,
    },
    /// Toggle the favorite flag.
    Favorite {
        id: ArticleId,
    },
    Delete {
        id: ArticleId,
    },
    /// Manage the reflection attached to an article.
    #[command(subcommand)]
    Reflect(ReflectCommand),
    /// Registered source names.
    Sources,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    source: Option<String>,
    /// `unread` or `read`.
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    favorite: Option<bool>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

#[derive(Subcommand, Debug)]
enum ReflectCommand {
    /// Create or replace the reflection text.
    Set { id: ArticleId, content: String },
    Show { id: ArticleId },
    Delete { id: ArticleId },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = json!({ "status": "error", "error": err.to_string() });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    start_logging(&config);

    if let Command::Sources = cli.command {
        print_json(&json!({ "sources": SourceRegistry::with_builtin_sources().source_names() }))?;
        return Ok(());
    }

    let conn = open_db_with_options(&config.db_path, config.db_options())?;
    match cli.command {
        Command::Ingest {
            source,
            max_count,
            options,
        } => ingest(&conn, &config, &source, max_count, options),
        Command::List(args) => list(&conn, args),
        Command::Tags => {
            let library = LibraryService::new(SqliteLibraryRepository::try_new(&conn)?);
            print_json(&json!({ "tags": library.tag_counts()? }))
        }
        Command::MarkRead { id } => {
            let library = LibraryService::new(SqliteLibraryRepository::try_new(&conn)?);
            library.mark_read(id)?;
            print_json(&json!({ "status": "success", "id": id, "reading_status": "read" }))
        }
        Command::Favorite { id } => {
            let library = LibraryService::new(SqliteLibraryRepository::try_new(&conn)?);
            let favorite = library.toggle_favorite(id)?;
            print_json(&json!({ "status": "success", "id": id, "favorite": favorite }))
        }
        Command::Delete { id } => {
            let library = LibraryService::new(SqliteLibraryRepository::try_new(&conn)?);
            library.delete_article(id)?;
            print_json(&json!({ "status": "success", "id": id }))
        }
        Command::Reflect(command) => reflect(&conn, command),
        Command::Sources => Ok(()),
    }
}

fn start_logging(config: &AppConfig) {
    let started = match config.log_dir.as_deref().and_then(|dir| dir.to_str()) {
        Some(dir) => init_logging(&config.log_level, dir),
        None => init_stderr_logging(&config.log_level),
    };
    if let Err(err) = started {
        eprintln!("logging disabled: {err}");
    }
}

fn ingest(
    conn: &Connection,
    config: &AppConfig,
    source: &str,
    max_count: usize,
    options: Vec<(String, String)>,
) -> CliResult<()> {
    let http = ReqwestHttpClient::new(config.http_timeout())?;
    let context = SourceContext::new(SourceCredentials::from_env(), Arc::new(http))
        .with_blacklist(config.blacklist());
    let mut pipeline = IngestPipeline::new(
        SourceRegistry::with_builtin_sources(),
        context,
        config.retry_policy(),
    );
    let report = pipeline.run_on_connection(
        conn,
        source,
        max_count,
        &SourceOptions::from_pairs(options),
    )?;
    print_json(&report)
}

fn list(conn: &Connection, args: ListArgs) -> CliResult<()> {
    let status = match args.status.as_deref() {
        Some(raw) => Some(
            ReadingStatus::parse(raw)
                .ok_or_else(|| format!("unknown reading status `{raw}`; expected unread|read"))?,
        ),
        None => None,
    };
    let query = ArticleListQuery {
        source: args.source,
        status,
        favorite: args.favorite,
        tag: args.tag,
        limit: args.limit,
        offset: args.offset,
    };
    let library = LibraryService::new(SqliteLibraryRepository::try_new(conn)?);
    print_json(&library.list_articles(&query)?)
}

fn reflect(conn: &Connection, command: ReflectCommand) -> CliResult<()> {
    let reflections = ReflectionService::new(SqliteReflectionRepository::try_new(conn)?);
    match command {
        ReflectCommand::Set { id, content } => {
            let reflection = match reflections.create(id, &content) {
                Err(ReflectionError::AlreadyExists(_)) => {
                    warn!(
                        "event=reflection_create module=cli status=exists article_id={} action=update",
                        id
                    );
                    reflections.update(id, &content)?
                }
                other => other?,
            };
            print_json(&reflection)
        }
        ReflectCommand::Show { id } => print_json(&reflections.get(id)?),
        ReflectCommand::Delete { id } => {
            reflections.delete(id)?;
            print_json(&json!({ "status": "success", "id": id }))
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("option key is empty in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
