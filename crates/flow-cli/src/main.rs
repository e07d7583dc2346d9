//! flow CLI — whole-program exception-flow analysis for Python.
//!
//! This binary provides the `flow` command with subcommands for
//! initialization, auditing entrypoints, tracing exception flow, and
//! running a persistent server. See `flow --help` for usage.

use std::time::Instant;

use clap::Parser;

mod cli_args;
mod commands;
mod project;
mod telemetry_recorder;

use cli_args::{Cli, Commands, OutputFormat};
use flow_output::human::HumanFormatter;
use flow_output::json::JsonFormatter;
use flow_output::OutputFormatter;

fn main() {
    let cli = Cli::parse();
    let formatter = select_formatter(&cli);
    let command_name = telemetry_recorder::command_name(&cli.command);
    let start = Instant::now();

    let code = match cli.command {
        Commands::Init { merge } => commands::init::run(formatter.as_ref(), cli.verbose, merge),
        Commands::Audit { framework, format } => {
            let formatter = format.map(formatter_for).unwrap_or(formatter);
            commands::audit::run(formatter.as_ref(), cli.verbose, framework)
        }
        Commands::Raises { exception_type, subclasses } => {
            commands::raises::run(formatter.as_ref(), cli.verbose, exception_type, subclasses)
        }
        Commands::Catches { exception_type, subclasses } => {
            commands::catches::run(formatter.as_ref(), cli.verbose, exception_type, subclasses)
        }
        Commands::Escapes { function } => {
            commands::escapes::run(formatter.as_ref(), cli.verbose, function)
        }
        Commands::RoutesTo { exception_type, subclasses, max_depth, max_paths } => {
            commands::routes_to::run(
                formatter.as_ref(),
                cli.verbose,
                exception_type,
                subclasses,
                max_depth,
                max_paths,
            )
        }
        Commands::Trace { function, max_depth, show_all } => {
            commands::trace::run(formatter.as_ref(), cli.verbose, function, max_depth, show_all)
        }
        Commands::Subclasses { class } => {
            commands::subclasses::run(formatter.as_ref(), cli.verbose, class)
        }
        Commands::Exceptions => commands::exceptions::run(formatter.as_ref(), cli.verbose),
        Commands::Stats => commands::stats::run(formatter.as_ref(), cli.verbose),
        Commands::Config { key, value } => commands::config::run(cli.verbose, key, value),
        Commands::Serve { http, watch } => {
            commands::serve::run(formatter.as_ref(), cli.verbose, http, watch)
        }
    };

    if let Ok(cwd) = std::env::current_dir() {
        telemetry_recorder::record_event(
            &cwd.join(".flow"),
            command_name,
            start.elapsed(),
            code,
            telemetry_recorder::EventMetrics::default(),
        );
    }

    std::process::exit(code);
}

fn select_formatter(cli: &Cli) -> Box<dyn OutputFormatter> {
    if cli.json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

fn formatter_for(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}
