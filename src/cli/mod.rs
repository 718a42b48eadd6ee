//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Payment API test orchestration engine
#[derive(Parser, Debug)]
#[command(name = "payflow")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Run data-driven test suites against a payment API")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a test suite
    Run(RunArgs),

    /// List the cases of a suite
    List(ListArgs),

    /// Build and sign a template without sending it
    Sign(SignArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test cases file (JSON array)
    #[arg(long)]
    pub cases: Option<String>,

    /// Directory holding `<key>.json` request templates
    #[arg(long)]
    pub templates: Option<String>,

    /// Run only this test case id
    #[arg(long = "case")]
    pub case_id: Option<String>,

    /// Run only cases with one of these tags (comma-separated)
    #[arg(long)]
    pub tag: Option<String>,

    /// Skip specific cases (comma-separated ids)
    #[arg(long)]
    pub skip: Option<String>,

    /// Run cases in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Number of concurrent cases (when parallel)
    #[arg(short, long)]
    pub concurrent: Option<usize>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Save results to file (.json or .csv)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Named environment from the configuration file
    #[arg(short, long)]
    pub env: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Test cases file (JSON array)
    #[arg(long)]
    pub cases: Option<String>,

    /// Show detailed case information
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for sign command
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Request template key
    #[arg(short, long)]
    pub template: String,

    /// Sign with this identity instead of the template's authorization ids
    #[arg(short, long)]
    pub identity: Option<String>,

    /// Directory holding `<key>.json` request templates
    #[arg(long)]
    pub templates: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "payflow.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Show environment variables
    Env,
}

/// Split a comma-separated flag value
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
