use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Catalog file (YAML or JSON) with providers, node definitions and operations
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Node configuration to execute (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub node: PathBuf,

    /// Execution context (JSON); a fresh context is created when omitted
    #[arg(long, value_name = "FILE")]
    pub context: Option<PathBuf>,

    /// Credential store (YAML) used to resolve the node's credential reference
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Workspace holding flowent.toml and .flowent/ (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Write the updated execution context here after the node runs
    #[arg(long, value_name = "FILE")]
    pub context_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct NodesArgs {
    /// Catalog file to list on top of the built-in node types
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Node configuration to check for unrecognized template expressions
    #[arg(long, value_name = "FILE")]
    pub node: PathBuf,
}
