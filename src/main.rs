//! Binary entry point for chronograph.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::multiple_crate_versions)]

use chronograph::cli;
use chronograph::models::ListRange;
use chronograph::observability::init_logging;
use chronograph::services::Registry;
use chronograph::RegistryConfig;
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

/// Chronograph, a bitemporal asset and connectivity registry.
#[derive(Parser)]
#[command(name = "chronograph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Acting user for permission-gated operations.
    #[arg(short, long, global = true, env = "CHRONOGRAPH_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Pagination arguments shared by list commands.
#[derive(Args)]
struct RangeArgs {
    /// Number of leading matches to skip.
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Maximum number of matches to print.
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

impl RangeArgs {
    const fn to_range(&self) -> ListRange {
        ListRange::new(self.offset, self.limit)
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and database.
    Init,
    /// Show aggregate store counts.
    Status,
    /// Component type catalog.
    #[command(subcommand)]
    Type(TypeCommands),
    /// Components and their connectivity.
    #[command(subcommand)]
    Component(ComponentCommands),
    /// Open a connection between two components.
    Connect {
        /// First component name.
        a: String,
        /// Second component name.
        b: String,
        /// Connection start, Unix seconds; defaults to now.
        #[arg(long)]
        start: Option<i64>,
        /// Connection end, Unix seconds; open-ended when omitted.
        #[arg(long)]
        end: Option<i64>,
        /// Free-text comments on the start stamp.
        #[arg(long)]
        comments: Option<String>,
    },
    /// Close the connection active at the given time.
    Disconnect {
        /// First component name.
        a: String,
        /// Second component name.
        b: String,
        /// Disconnection time, Unix seconds; defaults to now.
        #[arg(long)]
        end: Option<i64>,
        /// Free-text comments on the end stamp.
        #[arg(long)]
        comments: Option<String>,
    },
    /// Property values over time.
    #[command(subcommand)]
    Property(PropertyCommands),
    /// Operational flags.
    #[command(subcommand)]
    Flag(FlagCommands),
}

/// Component type subcommands.
#[derive(Subcommand)]
enum TypeCommands {
    /// Add a component type.
    Add {
        /// Unique type name.
        name: String,
        /// Free-text comments.
        #[arg(long, default_value = "")]
        comments: String,
    },
    /// List component types.
    List {
        /// Substring filter on the type name.
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
    },
}

/// Component subcommands.
#[derive(Subcommand)]
enum ComponentCommands {
    /// Add a component of an existing type.
    Add {
        /// Unique component name.
        name: String,
        /// The component's type.
        #[arg(long = "type")]
        type_name: String,
        /// Version within the type, if any.
        #[arg(long)]
        version: Option<String>,
    },
    /// List components.
    List {
        /// Substring filter on the component name.
        #[arg(long)]
        name: Option<String>,
        /// Exact filter on the type name.
        #[arg(long = "type")]
        type_name: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Print a point-in-time snapshot as JSON.
    Show {
        /// Component name.
        name: String,
        /// Snapshot time, Unix seconds; defaults to now.
        #[arg(long)]
        at: Option<i64>,
    },
    /// Print a component's connection history.
    Connections {
        /// Component name.
        name: String,
        /// Restrict to connections active at this time.
        #[arg(long)]
        at: Option<i64>,
    },
}

/// Property subcommands.
#[derive(Subcommand)]
enum PropertyCommands {
    /// Record property values from a start time.
    Set {
        /// Component name.
        component: String,
        /// Property type name.
        #[arg(long = "type")]
        type_name: String,
        /// The values, one per expected slot.
        #[arg(required = true)]
        values: Vec<String>,
        /// Interval start, Unix seconds; defaults to now.
        #[arg(long)]
        start: Option<i64>,
        /// Interval end, Unix seconds; open-ended when omitted.
        #[arg(long)]
        end: Option<i64>,
        /// Allow inserting before a later interval.
        #[arg(long)]
        force: bool,
    },
    /// Close the open interval of a property.
    Unset {
        /// Component name.
        component: String,
        /// Property type name.
        #[arg(long = "type")]
        type_name: String,
        /// Interval end, Unix seconds; defaults to now.
        #[arg(long)]
        end: Option<i64>,
    },
    /// Print a component's property intervals.
    History {
        /// Component name.
        component: String,
        /// Restrict to intervals active at this time.
        #[arg(long)]
        at: Option<i64>,
    },
}

/// Flag subcommands.
#[derive(Subcommand)]
enum FlagCommands {
    /// Raise a flag over a window.
    Add {
        /// Unique flag name.
        name: String,
        /// Flag type name.
        #[arg(long = "type")]
        type_name: String,
        /// Severity name.
        #[arg(long)]
        severity: String,
        /// Components to attach the flag to.
        #[arg(long = "component")]
        components: Vec<String>,
        /// Window start, Unix seconds; defaults to now.
        #[arg(long)]
        start: Option<i64>,
        /// Window end, Unix seconds; open-ended when omitted.
        #[arg(long)]
        end: Option<i64>,
        /// Free-text comments.
        #[arg(long, default_value = "")]
        comments: String,
    },
    /// Close a flag's window.
    End {
        /// Flag name.
        name: String,
        /// Window end, Unix seconds; defaults to now.
        #[arg(long)]
        end: Option<i64>,
    },
    /// List flags.
    List {
        /// Exact filter on the flag type name.
        #[arg(long = "type")]
        type_name: Option<String>,
        /// Exact filter on the severity name.
        #[arg(long)]
        severity: Option<String>,
        #[command(flatten)]
        range: RangeArgs,
    },
}

fn load_config(path: Option<&str>) -> chronograph::Result<RegistryConfig> {
    match path {
        Some(path) => RegistryConfig::load_from_file(std::path::Path::new(path)),
        None => Ok(RegistryConfig::load_default()),
    }
}

fn run(cli: Cli) -> chronograph::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    // The stamp uid: explicit user, else the OS login name.
    let uid = cli
        .user
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "unknown".to_string());

    if matches!(cli.command, Commands::Init) {
        return cli::cmd_init(config);
    }

    let mut registry = Registry::open(config)?;
    if let Some(user) = cli.user {
        registry = registry.acting_as(user);
    }

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Status => cli::cmd_status(&registry),
        Commands::Type(TypeCommands::Add { name, comments }) => {
            cli::cmd_type_add(&registry, &name, &comments)
        },
        Commands::Type(TypeCommands::List { name, range }) => {
            cli::cmd_type_list(&registry, name.as_deref(), range.to_range())
        },
        Commands::Component(ComponentCommands::Add {
            name,
            type_name,
            version,
        }) => cli::cmd_component_add(&registry, &name, &type_name, version.as_deref()),
        Commands::Component(ComponentCommands::List {
            name,
            type_name,
            range,
        }) => cli::cmd_component_list(
            &registry,
            name.as_deref(),
            type_name.as_deref(),
            range.to_range(),
        ),
        Commands::Component(ComponentCommands::Show { name, at }) => {
            cli::cmd_component_show(&registry, &name, at)
        },
        Commands::Component(ComponentCommands::Connections { name, at }) => {
            cli::cmd_connections(&registry, &name, at)
        },
        Commands::Connect {
            a,
            b,
            start,
            end,
            comments,
        } => cli::cmd_connect(&registry, &a, &b, start, end, &uid, comments.as_deref()),
        Commands::Disconnect { a, b, end, comments } => {
            cli::cmd_disconnect(&registry, &a, &b, end, &uid, comments.as_deref())
        },
        Commands::Property(PropertyCommands::Set {
            component,
            type_name,
            values,
            start,
            end,
            force,
        }) => cli::cmd_property_set(
            &registry, &component, &type_name, values, start, end, force, &uid,
        ),
        Commands::Property(PropertyCommands::Unset {
            component,
            type_name,
            end,
        }) => cli::cmd_property_unset(&registry, &component, &type_name, end, &uid),
        Commands::Property(PropertyCommands::History { component, at }) => {
            cli::cmd_property_history(&registry, &component, at)
        },
        Commands::Flag(FlagCommands::Add {
            name,
            type_name,
            severity,
            components,
            start,
            end,
            comments,
        }) => cli::cmd_flag_add(
            &registry, &name, &type_name, &severity, &components, start, end, &comments, &uid,
        ),
        Commands::Flag(FlagCommands::End { name, end }) => {
            cli::cmd_flag_end(&registry, &name, end, &uid)
        },
        Commands::Flag(FlagCommands::List {
            type_name,
            severity,
            range,
        }) => cli::cmd_flag_list(
            &registry,
            type_name.as_deref(),
            severity.as_deref(),
            range.to_range(),
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        },
    }
}
