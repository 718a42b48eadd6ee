//! payflow - Payment API test orchestration engine
//!
//! Runs data-driven test suites against a remote payment API. Each case
//! names a workflow: a single signed create, a create followed by a
//! settlement wait and a query, their bulk variants, or a read-only query.
//!
//! ## Features
//!
//! - Request templates stamped with fresh trace numbers and request ids
//! - CMS SignedData authorization strings per approver identity
//! - Fixed or polling settlement waits
//! - Sequential or bounded parallel execution with per-case isolation
//! - Multiple output formats (Table, JSON, CSV)
//!
//! ## Usage
//!
//! ```bash
//! # Run the configured suite
//! payflow run
//!
//! # Run one case against a named environment
//! payflow run --case TC001 --env sandbox
//!
//! # List the cases of a suite
//! payflow list --detailed
//!
//! # Show the signature a template would carry
//! payflow sign --template simple-inside
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

mod cli;
mod config;
mod engine;
mod error;
mod executor;
mod http;
mod models;
mod output;
mod results;
mod signing;
mod store;
#[cfg(test)]
mod test_support;
mod utils;
mod workflows;

use cli::{split_list, Args};
use config::{ConfigFile, EnvConfig};
use engine::{RequestBuilder, RunContext, TemplateShape};
use executor::{ParallelExecutor, Selection, TestRunner};
use http::{HttpClient, OAuthTokenClient, PaymentClient, TokenSource};
use models::SuiteEntry;
use output::{OutputFormat, ResultFormatter};
use signing::{signing_plaintext, SignatureService};
use store::FsTemplateStore;
use utils::logger::{init_logger, LogLevel};
use workflows::HandlerRegistry;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::from_verbose(args.verbose), env.log.as_deref());

    let config_path = args.config.clone().or_else(|| env.config_file.clone());

    match args.command {
        cli::Command::Run(run_args) => {
            let passed = run_suite(run_args, config_path.as_deref(), &env).await?;
            if !passed {
                return Ok(ExitCode::FAILURE);
            }
        }
        cli::Command::List(list_args) => {
            list_cases(list_args, config_path.as_deref(), &env)?;
        }
        cli::Command::Sign(sign_args) => {
            sign_template(sign_args, config_path.as_deref(), &env)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, config_path.as_deref(), &env)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Load the configuration file, then apply the environment and variables
fn load_config(path: Option<&str>, environment: Option<&str>, env: &EnvConfig) -> Result<ConfigFile> {
    let mut file = match path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    if let Some(name) = environment {
        file.apply_environment(name)?;
    }
    env.apply(&mut file.app);
    Ok(file)
}

fn path_or(flag: Option<String>, configured: &Path) -> PathBuf {
    flag.map(PathBuf::from).unwrap_or_else(|| configured.to_path_buf())
}

async fn run_suite(args: cli::RunArgs, config_path: Option<&str>, env: &EnvConfig) -> Result<bool> {
    let environment = args.env.clone().or_else(|| env.environment.clone());
    let file = load_config(config_path, environment.as_deref(), env)?;
    let app = file.app;

    let format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let cases_file = path_or(args.cases, &app.suite.cases_file);
    let templates_dir = path_or(args.templates, &app.suite.templates_dir);
    let entries = store::load_cases(&cases_file)?;

    let http = HttpClient::with_timeout(app.timeout_secs)?.base_url(&app.api.base_url);
    info!("Target API: {}", app.api.base_url);

    let token = OAuthTokenClient::new(http.clone(), &app.api)
        .fetch()
        .await
        .context("Cannot start run without an access token")?;

    let ctx = RunContext::new(
        token,
        Arc::new(PaymentClient::new(http, app.api.clone())),
        Arc::new(FsTemplateStore::new(templates_dir)),
        Arc::new(SignatureService::from_configs(&app.signing)),
        app.workflows.clone(),
    );

    let selection = Selection {
        case_id: args.case_id.or_else(|| env.test_case_id.clone()),
        tags: split_list(args.tag.as_deref()),
        skip: split_list(args.skip.as_deref()),
    };

    let runner = TestRunner::new(ctx, HandlerRegistry::standard())
        .with_selection(selection)
        .with_case_timeout(app.case_timeout_secs)
        .with_environment(environment.as_deref().unwrap_or("default"));

    let summary = if args.parallel || app.parallel {
        let executor = ParallelExecutor::new(args.concurrent.unwrap_or(app.max_concurrent));
        executor.run_all(&runner, &entries).await
    } else {
        runner.run_all(&entries).await
    };

    let mut formatter = ResultFormatter::new(format);
    if !std::io::stdout().is_terminal() {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_summary(&summary));

    if let Some(output) = args.output {
        results::save_summary(&summary, Path::new(&output))?;
        println!("✓ Results saved to {output}");
    }

    Ok(summary.is_all_passed())
}

fn list_cases(args: cli::ListArgs, config_path: Option<&str>, env: &EnvConfig) -> Result<()> {
    let file = load_config(config_path, env.environment.as_deref(), env)?;
    let cases_file = path_or(args.cases, &file.app.suite.cases_file);
    let entries = store::load_cases(&cases_file)?;

    println!("\nTest Cases in {} ({} total)\n", cases_file.display(), entries.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for entry in &entries {
        match entry {
            SuiteEntry::Valid(case) => {
                let target = case.workflow.template_key().unwrap_or("-");
                println!(
                    "  {:10} {:24} {:18} {}",
                    case.id,
                    case.kind().tag(),
                    target,
                    case.name
                );
                if args.detailed {
                    if let Some(description) = &case.description {
                        println!("             {description}");
                    }
                    println!("             expects HTTP {}", case.expected_status);
                    if let Some(field) = &case.expected_field {
                        println!(
                            "             expects {} = {}",
                            field,
                            case.expected_value.as_deref().unwrap_or("<present>")
                        );
                    }
                    if !case.tags.is_empty() {
                        println!("             tags: {}", case.tags.join(", "));
                    }
                }
            }
            SuiteEntry::Invalid(invalid) => {
                println!("  {:10} {:24} ✗ {}", invalid.id, entry.workflow_tag(), invalid.reason);
            }
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    Ok(())
}

fn sign_template(args: cli::SignArgs, config_path: Option<&str>, env: &EnvConfig) -> Result<()> {
    let file = load_config(config_path, env.environment.as_deref(), env)?;
    let templates = FsTemplateStore::new(path_or(args.templates, &file.app.suite.templates_dir));
    let signer = SignatureService::from_configs(&file.app.signing);
    let builder = RequestBuilder::new(&templates, &signer);

    let mut built = builder.build(&args.template, TemplateShape::Auto)?;
    println!("Template:  {}", args.template);
    println!("Plaintext: {}", signing_plaintext(&built.document)?);
    for (path, value) in built.values.iter() {
        println!("  {path} = {value}");
    }
    println!();

    match args.identity {
        Some(id) => {
            let signature = signer.sign(&built.document, &id)?;
            println!("{id}:\n{signature}");
        }
        None => {
            let count = builder.authorize(&mut built.document)?;
            println!("Signed {count} authorization(s):");
            let entries = built
                .document
                .pointer("/requestParameters/authorizations")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for entry in entries {
                let id = entry.get("authorizationId").and_then(Value::as_str).unwrap_or("?");
                let signature = entry
                    .get("authorizationString")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                println!("\n{id}:\n{signature}");
            }
        }
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&str>, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            let config = ConfigFile::example();
            config.save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { format } => {
            let mut config = load_config(config_path, env.environment.as_deref(), env)?;
            if !config.app.api.client_secret.is_empty() {
                config.app.api.client_secret = "<set>".to_string();
            }
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Env => {
            if env.has_any() {
                env.print_summary();
                println!();
            }
            config::env::print_env_help();
        }
    }

    Ok(())
}
