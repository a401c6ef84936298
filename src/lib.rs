pub mod catalog;
pub mod cli;
pub mod config;
pub mod ddl;
pub mod discovery;
pub mod error;
pub mod files;
pub mod infer;
pub mod load;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod sanitize;
pub mod schema;
pub mod source;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    catalog::CatalogSnapshot,
    cli::{Cli, Commands, DryRunArgs, SourceArgs, ValidateArgs},
    config::{ConfigOverrides, PipelineConfig},
    pipeline::Job,
    remote::RemoteCatalog,
    source::{CsvOptions, resolve_encoding},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("csv_ingest", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::DryRun(args) => handle_dry_run(&args),
    }
}

fn prepare(args: &SourceArgs) -> Result<(Job, PipelineConfig)> {
    let overrides = ConfigOverrides {
        growth_buffer: args.buffer,
        identifier_tier: args.identifier_tier,
        ..ConfigOverrides::default()
    };
    let config = PipelineConfig::resolve(args.config.as_deref(), &overrides)
        .context("Resolving pipeline configuration")?;
    let encoding = resolve_encoding(args.input_encoding.as_deref())?;
    let job = Job::new(&args.source, &args.table, &args.schema)
        .with_flavor(args.flavor)
        .with_options(CsvOptions {
            delimiter: args.delimiter,
            encoding,
        });
    debug!(
        "Resolved configuration: buffer={}, tier={}, flavor={}",
        config.growth_buffer, config.identifier_tier, job.flavor
    );
    Ok((job, config))
}

fn handle_validate(args: &ValidateArgs) -> Result<()> {
    let (job, config) = prepare(&args.source)?;
    info!(
        "Validating '{}' using delimiter '{}'",
        job.path.display(),
        printable_delimiter(source::resolve_input_delimiter(&job.path, job.options.delimiter))
    );
    let discovery = pipeline::validate(&job, &config)
        .with_context(|| format!("Validating {:?}", job.path))?;
    println!(
        "{}: {} row(s), {} column(s)",
        discovery.schema.qualified_name(),
        discovery.rows_scanned,
        discovery.schema.len()
    );
    print!("{}", table::render_columns(discovery.schema.columns(), &config));
    Ok(())
}

fn handle_dry_run(args: &DryRunArgs) -> Result<()> {
    let (job, config) = prepare(&args.source)?;
    let mut snapshot = match &args.catalog {
        Some(path) => Some(
            CatalogSnapshot::load(path).with_context(|| format!("Loading catalog from {path:?}"))?,
        ),
        None => None,
    };
    let preview = pipeline::dry_run(
        &job,
        snapshot.as_mut().map(|s| s as &mut dyn RemoteCatalog),
        &config,
    )
    .with_context(|| format!("Planning {:?}", job.path))?;

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&preview).context("Serializing dry-run report")?;
        println!("{rendered}");
        return Ok(());
    }

    let plan = &preview.reconciliation;
    println!(
        "-- {} scenario {} ({} row(s) scanned)",
        preview.schema.qualified_name(),
        plan.scenario.as_str(),
        preview.rows_scanned
    );
    if plan.is_noop() {
        println!("-- no DDL required");
    }
    for statement in &plan.statements {
        println!("{statement};");
    }
    println!();
    print!("{}", table::render_columns(preview.schema.columns(), &config));
    println!();
    println!("{};", preview.schema.insert_statement());
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
