mod handlers;

use clap::{CommandFactory, Parser};
use envcore::{
    cli::{EnvcoreArgs, EnvcoreSubcommand},
    EnvcoreError, EnvcoreResult,
};
use envutils::path::{envcore_home, LOG_PREFIX, LOG_SUBDIR, LOG_SUFFIX};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> EnvcoreResult<()> {
    // Parse command line arguments
    let args = EnvcoreArgs::parse();
    let _guard = init_logging(args.verbose)?;

    match args.subcommand {
        Some(EnvcoreSubcommand::Up {
            environments,
            mode,
            switch,
            watch,
        }) => {
            tracing::trace!("up: environments={environments:?}, mode={mode:?}, switch={switch}");
            handlers::up_subcommand(args.config, environments, mode, switch, watch).await?;
        }
        Some(EnvcoreSubcommand::List { json }) => {
            handlers::list_subcommand(args.config, json).await?;
        }
        Some(EnvcoreSubcommand::Validate) => {
            handlers::validate_subcommand(args.config).await?;
        }
        None => {
            EnvcoreArgs::command().print_help()?;
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Logs to stderr and to a daily rotated file under `~/.envcore/log`.
///
/// `RUST_LOG` takes precedence over `verbose`. The returned guard flushes the file writer on drop.
fn init_logging(verbose: bool) -> EnvcoreResult<WorkerGuard> {
    let log_dir = envcore_home()?.join(LOG_SUBDIR);
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .build(&log_dir)
        .map_err(EnvcoreError::custom)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}
