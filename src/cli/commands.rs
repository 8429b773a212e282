//! CLI command definitions

use clap::Args;

/// Run every step against a case
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Directory of step definitions (overrides `skills_dir` in the config)
    #[arg(short, long)]
    pub skills: Option<String>,

    /// Source document of the case; repeat for several
    #[arg(short, long, required = true)]
    pub input: Vec<String>,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Load and check the step definitions
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Directory of step definitions (overrides `skills_dir` in the config)
    #[arg(short, long)]
    pub skills: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
