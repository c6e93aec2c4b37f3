//! Purpose: Hold top-level CLI command dispatch for `jsonquery`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Notices collected while a command runs are emitted even when it fails.
//! Invariants: Helpers in `main.rs` remain the source of command business logic.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    settings: EngineSettings,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "jsonquery", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Query(args) => {
            // Stdin rows are not part of the cache key.
            let settings = if args.stdin {
                if settings.cache {
                    tracing::debug!(table = %args.table, "cache bypassed for stdin rows");
                }
                settings.without_cache()
            } else {
                settings
            };
            let mut engine = settings.engine();
            let result = run_query(&mut engine, &args);
            emit_notices(&engine.take_notices(), color_mode);
            let payload = result?;
            let date_columns = payload_date_columns(&payload);
            emit_json(payload.to_json(), color_mode, &date_columns);
            Ok(RunOutcome::ok())
        }
        Command::Describe { table, json } => {
            let mut engine = settings.engine();
            let result = describe_table(&mut engine, &table);
            emit_notices(&engine.take_notices(), color_mode);
            let (rows, columns) = result?;
            if json {
                let columns = columns
                    .iter()
                    .map(|(name, ty)| json!({ "name": name, "type": ty }))
                    .collect::<Vec<_>>();
                emit_json(
                    json!({ "table": table, "rows": rows, "columns": columns }),
                    color_mode,
                    &[],
                );
            } else {
                let cells = columns
                    .into_iter()
                    .map(|(name, ty)| vec![name, ty.to_string()])
                    .collect::<Vec<_>>();
                emit_table(&["COLUMN", "TYPE"], &cells);
                println!("{rows} rows");
            }
            Ok(RunOutcome::ok())
        }
        Command::Cache {
            command: CacheCommand::Clear,
        } => {
            let settings = EngineSettings {
                cache: true,
                ..settings
            };
            settings.engine().clear_cache()?;
            emit_json(
                json!({ "cleared": settings.cache_root().display().to_string() }),
                color_mode,
                &[],
            );
            Ok(RunOutcome::ok())
        }
    }
}

fn run_query(engine: &mut Engine, args: &QueryArgs) -> Result<Payload, Error> {
    if args.stdin {
        read_stdin_rows(engine, &args.table)?;
    }
    build_query(engine.from(args.table.as_str()), args)?.execute()
}

fn describe_table(
    engine: &mut Engine,
    name: &str,
) -> Result<(usize, Vec<(String, &'static str)>), Error> {
    let table = engine.table(name)?;
    let columns = table
        .column_types()
        .map(|types| {
            types
                .iter()
                .map(|(column, ty)| (column.to_string(), ty.as_str()))
                .collect()
        })
        .unwrap_or_default();
    Ok((table.len(), columns))
}
