//! Purpose: `jsonquery` CLI entry point and command helpers.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Query payloads are printed as JSON on stdout (pretty on a TTY).
//! Invariants: Non-interactive errors and notices are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All table access goes through `api::Engine`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{
    ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;

use color_json::{Highlight, colorize_json};
use jsonquery::api::{
    ColumnType, Engine, EngineOptions, Error, ErrorKind, Payload, Query, SortDirection,
    Value as CellValue, default_cache_dir, rows_from_json_str, to_exit_code,
};
use jsonquery::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    let settings = EngineSettings {
        data_dir: cli.dir.unwrap_or_else(|| PathBuf::from(".")),
        cache: cli.cache || cli.cache_dir.is_some(),
        cache_dir: cli.cache_dir.unwrap_or_else(default_cache_dir),
    };

    let result = command_dispatch::dispatch_command(cli.command, settings, color_mode);

    result
        .map_err(add_not_found_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "jsonquery",
    version,
    about = "SQL-like queries over directories of JSON documents",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Each table is one JSON document: <dir>/<table>.json, an array of objects.

Column suffixes drive typing when a table loads:
  - `_f` float, `_i` integer, `_d` date (stored as epoch seconds)
  - anything else stays as decoded
"#,
    after_help = r#"EXAMPLES
  $ jsonquery --dir data query videos --where year 2013
  $ jsonquery --dir data query videos --where 'coolness_rating_f >' 10 --sort coolness_rating_f:desc
  $ jsonquery --dir data query videos --where 'id @' '[9,50]' --select id,title
  $ jsonquery --dir data describe videos

LEARN MORE
  $ jsonquery <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        help = "Directory holding <table>.json documents (default: current directory)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Cache query results on disk")]
    cache: bool,
    #[arg(
        long,
        help = "Cache directory (default: ~/.jsonquery/cache); implies --cache",
        value_hint = ValueHint::DirPath
    )]
    cache_dir: Option<PathBuf>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Clone, Debug)]
struct EngineSettings {
    data_dir: PathBuf,
    cache: bool,
    cache_dir: PathBuf,
}

impl EngineSettings {
    fn engine(&self) -> Engine {
        let options = EngineOptions::new().data_dir(&self.data_dir);
        if self.cache {
            options.cache_dir(self.cache_root()).build()
        } else {
            options.build()
        }
    }

    /// Entry directory for this data directory; cache keys only cover the query.
    fn cache_root(&self) -> PathBuf {
        let data_dir =
            std::fs::canonicalize(&self.data_dir).unwrap_or_else(|_| self.data_dir.clone());
        let digest = Sha256::digest(data_dir.as_os_str().as_encoded_bytes());
        let mut name = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            name.push_str(&format!("{byte:02x}"));
        }
        self.cache_dir.join(name)
    }

    fn without_cache(self) -> Self {
        Self {
            cache: false,
            ..self
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run a query against one table",
        long_about = r#"Filter, sort, paginate, project, and group the rows of one table.

Where-clauses are KEY VALUE pairs. KEY is a column name, optionally followed by
an operator: =, <, <=, >, >=, @ (value in list), !@ (value not in list).
VALUE is parsed as JSON when it is valid JSON, otherwise taken as a string."#,
        after_help = r#"EXAMPLES
  $ jsonquery query videos --where year 2013
  $ jsonquery query videos --where 'coolness_rating_f >' 10 --limit 5 --offset 5
  $ jsonquery query videos --sort year --sort coolness_rating_f:desc
  $ jsonquery query videos --group-by year --select title,year
  $ echo '[{"id":1}]' | jsonquery query scratch --stdin --where id 1"#
    )]
    Query(QueryArgs),
    #[command(
        about = "Show a table's inferred column types and row count",
        after_help = r#"EXAMPLES
  $ jsonquery describe videos
  $ jsonquery describe videos --json"#
    )]
    Describe {
        #[arg(help = "Table name (loads <dir>/<table>.json)")]
        table: String,
        #[arg(long, help = "Emit JSON instead of a table")]
        json: bool,
    },
    #[command(arg_required_else_help = true, about = "Manage the result cache")]
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completion scripts",
        after_help = r#"EXAMPLES
  $ jsonquery completion bash > ~/.local/share/bash-completion/completions/jsonquery
  $ jsonquery completion zsh > ~/.zfunc/_jsonquery"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "Remove every cached result")]
    Clear,
}

#[derive(Args)]
struct QueryArgs {
    #[arg(help = "Table name (loads <dir>/<table>.json)")]
    table: String,
    #[arg(
        long = "where",
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        action = ArgAction::Append,
        help = "Where-clause; repeatable, all clauses must match"
    )]
    wheres: Vec<String>,
    #[arg(
        long = "sort",
        value_name = "COLUMN[:asc|:desc]",
        action = ArgAction::Append,
        help = "Sort key; repeatable, earlier keys take precedence"
    )]
    sorts: Vec<String>,
    #[arg(long, help = "Return at most N rows")]
    limit: Option<usize>,
    #[arg(long, help = "Skip the first N matching rows")]
    offset: Option<usize>,
    #[arg(long = "group-by", value_name = "COLUMN", help = "Group rows by a column")]
    group_by: Option<String>,
    #[arg(
        long,
        value_name = "COLUMNS",
        value_delimiter = ',',
        help = "Keep only these columns (comma-separated)"
    )]
    select: Vec<String>,
    #[arg(long, help = "Read the table as a JSON array from stdin instead of --dir")]
    stdin: bool,
}

/// Parses a `--where` value: JSON when it decodes, else the raw text.
fn parse_where_value(raw: &str) -> CellValue {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => CellValue::from_json(&value),
        Err(_) => CellValue::from(raw),
    }
}

fn parse_sort_key(raw: &str) -> Result<(String, SortDirection), Error> {
    let (column, direction) = match raw.rsplit_once(':') {
        Some((column, "asc")) => (column, SortDirection::Asc),
        Some((column, "desc")) => (column, SortDirection::Desc),
        Some((_, other)) => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid sort direction: {other}"))
                .with_hint("Use COLUMN, COLUMN:asc, or COLUMN:desc."));
        }
        None => (raw, SortDirection::Asc),
    };
    if column.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("sort column is empty")
            .with_hint("Use COLUMN, COLUMN:asc, or COLUMN:desc."));
    }
    Ok((column.to_string(), direction))
}

/// Applies the parsed query flags to a fresh query.
fn build_query<'a>(query: Query<'a>, args: &QueryArgs) -> Result<Query<'a>, Error> {
    let mut query = query.where_all(
        args.wheres
            .chunks(2)
            .map(|pair| (pair[0].as_str(), parse_where_value(&pair[1]))),
    );
    for raw in &args.sorts {
        query = match parse_sort_key(raw)? {
            (column, SortDirection::Asc) => query.sort_asc(column),
            (column, SortDirection::Desc) => query.sort_desc(column),
        };
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }
    if let Some(column) = &args.group_by {
        query = query.group_by(column.as_str());
    }
    if !args.select.is_empty() {
        query = query.select(args.select.clone());
    }
    Ok(query)
}

fn read_stdin_rows(engine: &mut Engine, table: &str) -> Result<(), Error> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    let rows = rows_from_json_str(&text, "stdin")?;
    engine.attach(rows, table);
    Ok(())
}

/// Date-typed columns appearing in a payload, by naming convention.
fn payload_date_columns(payload: &Payload) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let rows: Vec<_> = match payload {
        Payload::Rows(rows) => rows.iter().collect(),
        Payload::Groups(groups) => groups.iter().flat_map(|group| group.rows.iter()).collect(),
    };
    for row in rows {
        for column in row.columns() {
            if ColumnType::from_column_name(column) == ColumnType::Date
                && !columns.iter().any(|seen| seen == column)
            {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

fn add_not_found_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::NotFound || err.hint().is_some() {
        return err;
    }
    err.with_hint("Tables load from <dir>/<table>.json. Check --dir and the table name.")
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => err.with_hint(
            "Permission denied. Check directory permissions or use --cache-dir to a writable location.",
        ),
        ErrorKind::Busy => {
            err.with_hint("Cache entry is busy (another writer holds the lock). Retry shortly.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path and filesystem."),
        ErrorKind::CacheIo => err.with_hint(
            "Cache write failed. Check --cache-dir, disk space, or run `jsonquery cache clear`.",
        ),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    let mut sanitized_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut sanitized = Vec::with_capacity(widths.len());
        for (idx, width) in widths.iter_mut().enumerate() {
            let cleaned = sanitize_table_cell(row.get(idx).map(String::as_str).unwrap_or(""));
            *width = (*width).max(cleaned.chars().count());
            sanitized.push(cleaned);
        }
        sanitized_rows.push(sanitized);
    }

    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let mut lines = vec![format_table_line(&header_cells, &widths)];
    for row in sanitized_rows {
        lines.push(format_table_line(&row, &widths));
    }
    lines.join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        let cell_len = cell.chars().count();
        if idx + 1 < widths.len() && *width > cell_len {
            line.push_str(&" ".repeat(*width - cell_len));
        }
    }
    line
}

fn emit_json(value: Value, color_mode: ColorMode, date_columns: &[String]) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        colorize_json(
            &value,
            Highlight::new(use_color).with_date_columns(date_columns),
        )
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notices(notices: &[Notice], color_mode: ColorMode) {
    for notice in notices {
        emit_notice(notice, color_mode);
    }
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        match &notice.table {
            Some(table) => eprintln!("{label} {} (table: {table})", notice.message),
            None => eprintln!("{label} {}", notice.message),
        }
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Configuration => "invalid configuration".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Parse => "parse error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::CacheIo => "cache i/o error".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Busy => "resource is busy".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(table) = err.table() {
        lines.push(format!(
            "{} {table}",
            colorize_label("table:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `jsonquery --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "jsonquery") else {
        return "Try `jsonquery --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !(token.starts_with('-') || token.starts_with('<') || token.starts_with('['))
        })
        .copied()
        .collect();

    if parts.is_empty() {
        return "Try `jsonquery --help`.".to_string();
    }
    if parts.as_slice() == ["query"] && rendered.contains("--where") {
        return "Each --where takes a KEY and a VALUE, e.g. `--where 'year >=' 2013`.".to_string();
    }

    format!("Try `jsonquery {} --help`.", parts.join(" "))
}
