use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use pgfn::cli::{Cli, Commands};
use pgfn::commands::{
    execute_make_migrations, execute_setup, execute_show_migrations, print_make_migrations_summary,
    print_show_summary,
};
use pgfn::config::PgfnConfig;
use pgfn::error::{format_error_chain, suggest_fix, PgfnError, Result};
use pgfn::logging::{self, format_duration, output};
use pgfn::output::CliOutputHandler;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            report(&err, cli.verbose);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let config_file = PgfnConfig::load_from_path(&cli.config)?;

    match &cli.command {
        Commands::Init => {
            let path = PgfnConfig::write_sample_config(Path::new("."))?;
            output::success(format!("Wrote {}", path.display()));
            output::step("Copy it to pgfn.toml and fill in your connection string and apps");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Setup { connection_string } => {
            let config = PgfnConfig::merge_with_cli(config_file, connection_string.clone(), None, None);
            execute_setup(&config).await?;
            output::success("Function state table is ready");
            Ok(ExitCode::SUCCESS)
        }
        Commands::MakeMigrations { name, dry_run, connection_string, migrations_root, default_app, then } => {
            let config = PgfnConfig::merge_with_cli(
                config_file,
                connection_string.clone(),
                migrations_root.clone(),
                default_app.clone(),
            );

            let started = Instant::now();
            let generated = execute_make_migrations(&config, name.as_deref(), *dry_run, &CliOutputHandler).await;
            let mut code = match generated {
                Ok(result) => {
                    print_make_migrations_summary(&result);
                    tracing::info!("make-migrations finished in {}", format_duration(started.elapsed()));
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    if let Some(headline) = make_migrations_headline(&err) {
                        output::error(headline);
                    }
                    report(&err, cli.verbose);
                    ExitCode::FAILURE
                }
            };

            if !then.is_empty() {
                code = run_chained(then).await?;
            }
            Ok(code)
        }
        Commands::ShowMigrations { app, migrations_root } => {
            let config = PgfnConfig::merge_with_cli(config_file, None, migrations_root.clone(), None);
            let result = execute_show_migrations(&config.migrations_root(), app.as_deref())?;
            print_show_summary(&result);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the command given after `--` and pass its exit status through
async fn run_chained(command: &[String]) -> Result<ExitCode> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| PgfnError::Other("empty chained command".to_string()))?;

    output::step(format!("Running {}", command.join(" ")));
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| PgfnError::Other(format!("failed to run '{}': {}", program, e)))?;

    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}

/// Extra first line for `make-migrations` failures caused by a missing
/// state table
fn make_migrations_headline(err: &PgfnError) -> Option<&'static str> {
    err.is_store_unavailable()
        .then_some("Could not make migrations for pgfn functions. Is the state table set up?")
}

fn report(err: &PgfnError, verbosity: u8) {
    output::error(err);
    if let Some(suggestion) = suggest_fix(err) {
        output::detail(suggestion);
    }
    if verbosity > 0 {
        output::detail(format_error_chain(err));
    }
}
