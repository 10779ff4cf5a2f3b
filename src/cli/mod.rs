pub mod args;
pub mod commands;

pub use args::{NodesArgs, RunArgs, ValidateArgs};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
NODE COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "flowent")]
#[command(version = crate::VERSION)]
#[command(about = "Workflow node execution engine")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: list node types, validate a node's templates, then run it against a context."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Execute one node and print its result envelope",
        long_about = "Run resolves the node's templates against the execution context, then either calls the provider API or evaluates the built-in node, and prints the result as JSON.",
        after_help = "Example:\n    flowent run --catalog catalog.yaml --node node.json --context ctx.json"
    )]
    Run(RunArgs),
    #[command(
        about = "List known node types",
        long_about = "Nodes prints every built-in node type plus the node definitions from an optional catalog file.",
        after_help = "Example:\n    flowent nodes --catalog catalog.yaml"
    )]
    Nodes(NodesArgs),
    #[command(
        about = "Check a node for unrecognized template expressions",
        long_about = "Validate lists every {{ ... }} expression the resolver would leave verbatim and exits non-zero when any are found.",
        after_help = "Example:\n    flowent validate --node node.yaml"
    )]
    Validate(ValidateArgs),
}

/// Dispatch a parsed command. Returns `true` when the command succeeded.
pub async fn run(args: Args) -> crate::Result<bool> {
    match args.command {
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Nodes(nodes_args) => commands::nodes(nodes_args),
        Command::Validate(validate_args) => commands::validate(validate_args),
    }
}
