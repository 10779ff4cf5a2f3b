use crate::cli::Command;
use std::env;

/// How the process is being run, which decides where console logs go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Interactive CLI use; logs go to stderr so stdout stays machine-readable.
    LocalDev,
    /// Embedded in a service or daemon; console sinks stay quiet.
    Service,
}

impl RunMode {
    /// Returns `true` when console sinks should be disabled.
    pub fn disables_console(self) -> bool {
        matches!(self, RunMode::Service)
    }
}

/// Derive the run mode from a parsed CLI command plus overrides.
pub fn detect_run_mode(command: &Command) -> RunMode {
    if service_override_enabled() {
        return RunMode::Service;
    }

    match command {
        Command::Run(_) | Command::Nodes(_) | Command::Validate(_) => RunMode::LocalDev,
    }
}

fn service_override_enabled() -> bool {
    env::var("FLOWENT_SERVICE_MODE")
        .map(|value| value.trim() == "1")
        .unwrap_or(false)
}
