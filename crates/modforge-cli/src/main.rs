//! generate-module: render the golden Python module template from the command line.
//!
//! The descriptor comes from flags, from a TOML/JSON descriptor file, or from
//! both (flags win). The rendered module is written atomically to `--out`, or
//! printed with `--stdout`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use modforge::{
    config::Config, diagnose, render, validate, write, FieldSpec, ModuleDescriptor,
    ValidationError, WriteError, WriteOptions,
};

/// Exit codes for the CLI
///
/// - 0: Success
/// - 1: Invalid descriptor (every problem is reported)
/// - 2: Error (write failure, unreadable descriptor file, etc.)
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const INVALID_DESCRIPTOR: u8 = 1;
    pub const ERROR: u8 = 2;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Generate a style-compliant Python module from a module descriptor
#[derive(Parser)]
#[command(name = "generate-module")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load the descriptor from a TOML or JSON file (flags override its values)
    #[arg(long, value_name = "FILE")]
    descriptor: Option<PathBuf>,

    /// Module name (lowercase letters, digits, underscores)
    #[arg(long, value_name = "MODULE_NAME", required_unless_present = "descriptor")]
    name: Option<String>,

    /// Name of the immutable value type (PascalCase)
    #[arg(long, value_name = "NAME", required_unless_present = "descriptor")]
    value_type: Option<String>,

    /// Field of the value type, as name:type[:default] (repeatable, in order)
    ///
    /// Types: string, integer, path, bytes. Replaces the descriptor file's fields.
    #[arg(long = "field", value_name = "NAME:TYPE[:default]")]
    fields: Vec<FieldSpec>,

    /// Name of the capability boundary (PascalCase)
    #[arg(long, value_name = "NAME", required_unless_present = "descriptor")]
    capability: Option<String>,

    /// Name of the top-level operation (lowercase letters, digits, underscores)
    #[arg(long, value_name = "NAME", required_unless_present = "descriptor")]
    operation: Option<String>,

    /// Author credited in the module header (defaults to the configured author)
    #[arg(long)]
    author: Option<String>,

    /// Destination file or directory (defaults to <module_name>.py in the current directory)
    #[arg(short, long, value_name = "PATH", conflicts_with = "stdout")]
    out: Option<PathBuf>,

    /// Replace an existing file at the destination
    #[arg(long, conflicts_with = "stdout")]
    overwrite: bool,

    /// Print the rendered module instead of writing it
    #[arg(long)]
    stdout: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    // Initialize logging: RUST_LOG when set, warn otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            report_error(format, "CommandFailed", &format!("{:#}", e), None);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    let config = Config::load(&cwd);

    let descriptor = build_descriptor(&cli, &config)?;

    let problems = diagnose(&descriptor);
    if !problems.is_empty() {
        report_invalid(cli.format, &problems);
        return Ok(exit_codes::INVALID_DESCRIPTOR);
    }

    let validated = validate(descriptor)?;
    let rendered = render(&validated);

    if cli.stdout {
        print!("{}", rendered.text());
        return Ok(exit_codes::SUCCESS);
    }

    let destination = destination(cli.out.as_deref(), &rendered.file_name());
    let options = WriteOptions {
        overwrite: cli.overwrite || config.overwrite,
    };

    match write(&rendered, &destination, options) {
        Ok(path) => {
            report_written(
                cli.format,
                cli.quiet,
                &path,
                &validated.descriptor().module_name,
                rendered.field_names().len(),
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            report_write_error(cli.format, &e);
            Ok(exit_codes::ERROR)
        }
    }
}

/// Merge the descriptor file (if any), flags, and configuration.
fn build_descriptor(cli: &Cli, config: &Config) -> Result<ModuleDescriptor> {
    let mut descriptor = match &cli.descriptor {
        Some(path) => ModuleDescriptor::load(path)?,
        None => ModuleDescriptor::new("", "", "", ""),
    };

    if let Some(name) = &cli.name {
        descriptor.module_name = name.clone();
    }
    if let Some(value_type) = &cli.value_type {
        descriptor.value_type_name = value_type.clone();
    }
    if let Some(capability) = &cli.capability {
        descriptor.capability_name = capability.clone();
    }
    if let Some(operation) = &cli.operation {
        descriptor.operation_name = operation.clone();
    }
    if !cli.fields.is_empty() {
        descriptor.fields = cli.fields.clone();
    }

    if cli.author.is_some() {
        descriptor.author = cli.author.clone();
    } else if descriptor.author.is_none() {
        descriptor.author = config.author.clone();
    }

    Ok(descriptor)
}

/// Resolve `--out`: missing means `./<file_name>`, a directory means `<dir>/<file_name>`.
fn destination(out: Option<&Path>, file_name: &str) -> PathBuf {
    match out {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    }
}

fn report_written(format: OutputFormat, quiet: bool, path: &Path, module: &str, fields: usize) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "path": path.display().to_string(),
                    "module": module,
                    "fields": fields,
                })
            );
        }
        OutputFormat::Text => {
            if !quiet {
                println!("Wrote {} ({} fields) to {}", module, fields, path.display());
            }
        }
    }
}

fn report_invalid(format: OutputFormat, problems: &[ValidationError]) {
    let Some(first) = problems.first() else {
        return;
    };

    match format {
        OutputFormat::Json => {
            let details: Vec<_> = problems
                .iter()
                .map(|p| serde_json::json!({"kind": p.kind(), "message": p.to_string()}))
                .collect();
            report_error(format, first.kind(), &first.to_string(), Some(details));
        }
        OutputFormat::Text => {
            for problem in problems {
                eprintln!("error[{}]: {}", problem.kind(), problem);
            }
            eprintln!(
                "Descriptor rejected: {} problem{} found",
                problems.len(),
                if problems.len() == 1 { "" } else { "s" }
            );
        }
    }
}

fn report_write_error(format: OutputFormat, error: &WriteError) {
    report_error(format, error.kind(), &error.to_string(), None);
}

fn report_error(
    format: OutputFormat,
    kind: &str,
    message: &str,
    problems: Option<Vec<serde_json::Value>>,
) {
    match format {
        OutputFormat::Json => {
            let mut error_json = serde_json::json!({
                "error": kind,
                "message": message,
            });
            if let Some(problems) = problems {
                error_json["problems"] = serde_json::Value::Array(problems);
            }
            eprintln!("{}", error_json);
        }
        OutputFormat::Text => eprintln!("error[{}]: {}", kind, message),
    }
}
