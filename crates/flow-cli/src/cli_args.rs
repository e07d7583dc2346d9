use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "flow", version, about = "Whole-program exception-flow analyzer")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as structured JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output as human-readable prose (default)
    #[arg(long, global = true)]
    pub human: bool,

    /// Include extra diagnostic detail in output
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Initialize flow in a repository (.flow/config.yaml, .flow/cache.db)
    Init {
        /// Re-initialize even if .flow/ already exists, preserving config
        #[arg(long)]
        merge: bool,
    },

    /// List every entrypoint and what escapes it uncaught
    Audit {
        /// Scope the audit to one framework's entrypoints (flask, fastapi, django, cli)
        #[arg(long)]
        framework: Option<String>,
        /// Override the global output format for this command
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Find every place an exception type is raised
    Raises {
        /// Exception type name, e.g. ValueError
        exception_type: String,
        /// Also search for raises of subclasses
        #[arg(long)]
        subclasses: bool,
    },

    /// Find every place an exception type is caught, locally or globally
    Catches {
        /// Exception type name, e.g. ValueError
        exception_type: String,
        /// Also search for catches that would catch a subclass
        #[arg(long)]
        subclasses: bool,
    },

    /// Show what escapes a single function uncaught, caught, or framework-handled
    Escapes {
        /// Function name (qualified or simple)
        function: String,
    },

    /// Trace raise sites of an exception type forward to the entrypoints they reach
    RoutesTo {
        /// Exception type name, e.g. ValueError
        exception_type: String,
        /// Also search for raises of subclasses
        #[arg(long)]
        subclasses: bool,
        /// Maximum backward-trace depth (default: 20)
        #[arg(long, default_value = "20")]
        max_depth: usize,
        /// Maximum number of paths to collect per raise site (default: 150)
        #[arg(long, default_value = "150")]
        max_paths: usize,
    },

    /// Show a function's call tree annotated with direct and propagated raises
    Trace {
        /// Function name (qualified or simple)
        function: String,
        /// Maximum call-tree depth (default: 10)
        #[arg(long, default_value = "10")]
        max_depth: usize,
        /// Include callees that raise nothing, not just the ones that do
        #[arg(long)]
        show_all: bool,
    },

    /// List the subclasses of an exception class
    Subclasses {
        /// Class name (qualified or simple)
        class: String,
    },

    /// List every exception class detected in the project
    Exceptions,

    /// Print whole-program counts: functions, classes, raise/catch/call sites, entrypoints
    Stats,

    /// Get or set a .flow/config.yaml value (dot-notation for nested keys)
    Config {
        /// Config key, e.g. resolution_mode or handled_base_classes
        key: Option<String>,
        /// New value for the key; omit to read the current value
        value: Option<String>,
    },

    /// Run the persistent flow-server (HTTP API and/or file watcher)
    Serve {
        /// HTTP API on localhost
        #[arg(long)]
        http: bool,
        /// File system watcher that invalidates the extraction cache
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Human,
}
