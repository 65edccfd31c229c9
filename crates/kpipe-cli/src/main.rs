use clap::{Parser, Subcommand};
use kpipe::commands::{
    cat::{self, CatCommand},
    config::{self as config_cmd, ConfigAction},
    grep::{self, GrepCommand},
    init::{self, InitCommand},
    run::{self, RunCommand},
};
use kpipe::GlobalOpts;
use kpipe_config::Config;
use kpipe_logger as logger;
use std::io;

#[derive(Parser)]
#[command(name = "kpipe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Pipe YAML resource packages through filters",
    long_about = "kpipe reads YAML resource documents from a directory package or stdin, \
                  runs them through declarative filters and writes them back."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the documents of a package as one stream
    Cat(CatCommand),
    /// Apply a pipeline file to a package (or stdin)
    Run(RunCommand),
    /// Print only the documents matching a selector
    Grep(GrepCommand),
    /// Initialize a new pipeline file
    Init(InitCommand),
    /// Configure kpipe defaults
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Warning: {}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        logger::warn(&format!("Failed to load config, using defaults: {}", e));
        Config::default()
    });

    let result = match &cli.command {
        Commands::Cat(cmd) => cat::handle_cat(cmd, &config, io::stdout().lock()),
        Commands::Run(cmd) => run::handle_run(cmd, &config, io::stdout().lock()),
        Commands::Grep(cmd) => grep::handle_grep(cmd, &config, io::stdout().lock()),
        Commands::Init(cmd) => init::handle_init(cmd).map(|_| ()),
        Commands::Config { action } => config_cmd::handle_config(action.clone(), &cli.global),
    };

    if let Err(e) = result {
        logger::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
