mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use globset::{Glob, GlobSet, GlobSetBuilder};
use logging::{LogFormat, LogLevel, LogSettings};
use m2n_codegen::{CodeGenerator, GeneratorOptions};
use m2n_diags::DiagnosticError;
use m2n_hir::{Binder, BindingModel, FunctionKind, NativeFunction, TypePath};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "m2n")]
#[command(about = "Generates C bindings for managed assemblies", long_about = None)]
struct Cli {
    /// Log verbosity: error, warn, info, debug or trace (overrides M2N_LOG_LEVEL)
    #[arg(long, global = true, value_parser = parse_level)]
    log_level: Option<LogLevel>,

    /// Log format: auto, text or json (overrides M2N_LOG_FORMAT)
    #[arg(long, global = true, value_parser = parse_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the C header and source for an assembly description
    Generate {
        /// The .m2n file describing the managed assembly
        file: PathBuf,
        /// Directory the generated files are written to
        #[arg(short = 'o', long = "output", default_value = ".")]
        output: PathBuf,
        /// Stem of the generated .h/.c files
        #[arg(long)]
        name: Option<String>,
        /// Do not write m2n_support.h; include it as a system header instead
        #[arg(long)]
        no_support: bool,
        /// Only bind types matching these patterns (glob syntax, can be repeated)
        #[arg(short = 'f', long = "filter")]
        filter: Vec<String>,
    },
    /// Parse and bind an assembly description without writing anything
    Check {
        /// The .m2n file describing the managed assembly
        file: PathBuf,
    },
    /// List the native symbols an assembly description exports
    Symbols {
        /// The .m2n file describing the managed assembly
        file: PathBuf,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
        /// Only list types matching these patterns (glob syntax, can be repeated)
        #[arg(short = 'f', long = "filter")]
        filter: Vec<String>,
    },
}

fn parse_level(spec: &str) -> Result<LogLevel, String> {
    LogLevel::parse(spec).ok_or_else(|| format!("unknown log level '{}'", spec))
}

fn parse_format(spec: &str) -> Result<LogFormat, String> {
    LogFormat::parse(spec).ok_or_else(|| format!("unknown log format '{}'", spec))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings = LogSettings {
        format: cli.log_format,
        level: cli.log_level,
    };
    let options = settings.merged_with_env();
    logging::init_logging(&options);
    debug!(format = %options.format, level = %options.level, "logging initialised");

    match cli.command {
        Commands::Generate {
            file,
            output,
            name,
            no_support,
            filter,
        } => generate_command(&file, &output, name, no_support, filter),
        Commands::Check { file } => check_command(&file),
        Commands::Symbols { file, json, filter } => symbols_command(&file, json, filter),
    }
}

/// A parsed and bound assembly description.
struct Loaded {
    filename: String,
    source: String,
    model: BindingModel,
}

impl Loaded {
    /// Prints every binding failure and returns how many there were.
    fn report_errors(&self) -> Result<usize> {
        for error in &self.model.errors {
            error
                .to_diagnostic(&self.filename)
                .report(&self.source)
                .context("failed to print diagnostic")?;
        }
        Ok(self.model.errors.len())
    }
}

fn load(file: &Path) -> Result<Loaded> {
    let source = fs::read_to_string(file).with_context(|| format!("failed to read file: {}", file.display()))?;
    let filename = file.display().to_string();

    let assembly = m2n_parser::Parser::new(&source)
        .and_then(|parser| parser.parse())
        .map_err(|err| report_syntax_error(err, &filename, &source))?;
    let model = Binder::new().bind(&assembly);
    info!(
        file = %filename,
        classes = model.classes.len(),
        enums = model.enums.len(),
        functions = model.functions.len(),
        errors = model.errors.len(),
        "bound assembly"
    );

    Ok(Loaded {
        filename,
        source,
        model,
    })
}

fn report_syntax_error(err: DiagnosticError, filename: &str, source: &str) -> anyhow::Error {
    if let Err(io) = err.to_diagnostic(filename).report(source) {
        return anyhow::anyhow!("could not parse {}: {} ({})", filename, err, io);
    }
    anyhow::anyhow!("could not parse {}", filename)
}

fn generate_command(
    file: &Path,
    output: &Path,
    name: Option<String>,
    no_support: bool,
    filters: Vec<String>,
) -> Result<()> {
    let filter = TypeFilter::new(filters)?;

    println!("{} {}", "Generating".green().bold(), file.display());
    let loaded = load(file)?;
    let failures = loaded.report_errors()?;
    let model = filter.apply(&loaded.model);
    println!(
        "  {} Bound {} functions across {} types",
        "→".cyan(),
        model.functions.len(),
        model.classes.len() + model.enums.len()
    );

    let mut options = GeneratorOptions::default();
    if let Some(name) = name {
        options.library_name = name;
    }
    options.generate_support_files = !no_support;

    let files = CodeGenerator::new(options).generate(&model)?;
    fs::create_dir_all(output).with_context(|| format!("failed to create directory: {}", output.display()))?;
    for generated in &files {
        let path = output.join(&generated.name);
        fs::write(&path, &generated.contents).with_context(|| format!("failed to write file: {}", path.display()))?;
        println!("  {} Wrote {}", "→".cyan(), path.display());
    }

    if failures > 0 {
        bail!("{} member(s) could not be bound and were left out", failures);
    }
    println!("{} Generated {} files", "✓".green().bold(), files.len());
    Ok(())
}

fn check_command(file: &Path) -> Result<()> {
    let loaded = load(file)?;
    let failures = loaded.report_errors()?;
    if failures > 0 {
        bail!("{} member(s) could not be bound", failures);
    }

    println!(
        "{} {}: {} classes, {} enums, {} functions",
        "✓".green().bold(),
        file.display(),
        loaded.model.classes.len(),
        loaded.model.enums.len(),
        loaded.model.functions.len()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct SymbolRow<'a> {
    symbol: &'a str,
    owner: String,
    kind: &'static str,
    is_static: bool,
    signature: String,
}

impl<'a> SymbolRow<'a> {
    fn new(function: &'a NativeFunction) -> Self {
        let kind = match function.kind {
            FunctionKind::Constructor => "constructor",
            FunctionKind::Method => "method",
            FunctionKind::Getter { .. } => "getter",
            FunctionKind::Setter { .. } => "setter",
        };
        Self {
            symbol: &function.symbol,
            owner: function.owner.dotted(),
            kind,
            is_static: function.is_static,
            signature: function.managed_signature(),
        }
    }
}

/// Binding failures are reported on stderr but do not fail the listing.
fn symbols_command(file: &Path, json: bool, filters: Vec<String>) -> Result<()> {
    let filter = TypeFilter::new(filters)?;
    let loaded = load(file)?;
    loaded.report_errors()?;
    let model = filter.apply(&loaded.model);

    let rows: Vec<SymbolRow> = model.functions.iter().map(SymbolRow::new).collect();
    if json {
        let text = serde_json::to_string_pretty(&rows).context("failed to serialize symbols")?;
        println!("{}", text);
        return Ok(());
    }

    let width = rows.iter().map(|row| row.symbol.len()).max().unwrap_or(0);
    for row in &rows {
        let marker = if row.is_static { "static " } else { "" };
        println!("{:<width$}  {}{}::{}", row.symbol, marker, row.owner, row.signature, width = width);
    }
    Ok(())
}

/// Type filter for `--filter` patterns, matched against dotted type paths.
struct TypeFilter {
    matcher: Option<GlobSet>,
}

impl TypeFilter {
    fn new(patterns: Vec<String>) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { matcher: None });
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            // A pattern without wildcards also selects everything nested under it.
            let is_plain = !pattern.contains(['*', '?', '[', '{']);
            if is_plain {
                builder.add(Glob::new(&format!("{}.*", pattern))?);
            }
            builder.add(Glob::new(&pattern).with_context(|| format!("invalid filter pattern: {}", pattern))?);
        }
        Ok(Self {
            matcher: Some(builder.build()?),
        })
    }

    fn matches(&self, path: &TypePath) -> bool {
        match &self.matcher {
            Some(matcher) => matcher.is_match(path.dotted()),
            None => true,
        }
    }

    fn apply(&self, model: &BindingModel) -> BindingModel {
        model.select(|path| self.matches(path))
    }
}
