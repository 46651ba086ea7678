//! tessel CLI - on-demand build and render server for HTML sites.
//!
//! Parses arguments, sets up logging and dispatches to a command.

use clap::Parser;
use miette::Result;
use tessel_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let config_path = args.config.as_deref();
    let result = match args.command {
        cli::Command::Serve(serve_args) => commands::serve_execute(serve_args, config_path).await,
        cli::Command::Build(build_args) => commands::build_execute(build_args, config_path).await,
        cli::Command::Render(render_args) => commands::render_execute(render_args, config_path).await,
        cli::Command::Fetch(fetch_args) => commands::fetch_execute(fetch_args, config_path).await,
        cli::Command::Resolve(resolve_args) => commands::resolve_execute(resolve_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
