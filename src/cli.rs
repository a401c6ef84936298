use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::IdentifierTier, source::SourceFlavor};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer relational schemas from delimited files and plan the DDL to land them",
    long_about = None
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a file and print the inferred column types and sizes
    Validate(ValidateArgs),
    /// Scan a file and print the DDL and insert statement it would produce
    DryRun(DryRunArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Delimited file to scan
    #[arg(short = 'i', long = "source", alias = "input")]
    pub source: PathBuf,
    /// Target table name (sanitized before use)
    #[arg(short, long)]
    pub table: String,
    /// Target schema name (sanitized before use)
    #[arg(short, long)]
    pub schema: String,
    /// Field delimiter (supports ',', 'tab', ';', '|'); defaults by extension
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Reader flavor: generic or salesforce
    #[arg(long, default_value = "generic", value_parser = parse_flavor)]
    pub flavor: SourceFlavor,
    /// Extra characters added to observed text widths
    #[arg(long = "buffer")]
    pub buffer: Option<usize>,
    /// Identifier length tier: legacy (30) or extended (128)
    #[arg(long = "identifier-tier", value_parser = parse_tier)]
    pub identifier_tier: Option<IdentifierTier>,
    /// YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct DryRunArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// YAML snapshot of existing tables; without it the table is treated as new
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "pipe" | "|" => Ok(b'|'),
        "semicolon" | ";" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_flavor(value: &str) -> Result<SourceFlavor, String> {
    value.parse()
}

fn parse_tier(value: &str) -> Result<IdentifierTier, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delimiter_aliases() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("|").unwrap(), b'|');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
    }

    #[test]
    fn dry_run_arguments_parse() {
        let cli = Cli::try_parse_from([
            "csv-ingest",
            "dry-run",
            "--source",
            "contacts.csv",
            "--table",
            "contacts",
            "--schema",
            "sales",
            "--flavor",
            "salesforce",
            "--identifier-tier",
            "extended",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::DryRun(args) => {
                assert!(args.json);
                assert_eq!(args.source.flavor, SourceFlavor::Salesforce);
                assert_eq!(args.source.identifier_tier, Some(IdentifierTier::Extended));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
