//! Encode command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use fido_broker_core::options::COSE_ALG_ES256;
use fido_broker_core::{
    codec, CorrelationToken, CredentialDescriptor, CredentialOptions, RequestKind,
};
use tracing::{debug, info};

use crate::utils::parse_hex;
use crate::{KindArg, UvArg};

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Ceremony the options are for
    #[arg(short, long, value_enum)]
    pub kind: KindArg,

    /// Relying party id (effective domain)
    #[arg(long)]
    pub rp_id: String,

    /// Human-readable relying party name
    #[arg(long)]
    pub rp_name: Option<String>,

    /// Challenge as hex
    #[arg(long, value_name = "HEX")]
    pub challenge: String,

    /// Ceremony timeout in milliseconds (0 or absent uses the broker default)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// User verification requirement
    #[arg(long, value_enum, default_value = "preferred")]
    pub uv: UvArg,

    /// Allowed credential id as hex (repeatable)
    #[arg(long = "allow", value_name = "HEX")]
    pub allow: Vec<String>,

    /// Excluded credential id as hex (repeatable)
    #[arg(long = "exclude", value_name = "HEX")]
    pub exclude: Vec<String>,

    /// User handle as hex (registration)
    #[arg(long, value_name = "HEX", requires = "user_name")]
    pub user_id: Option<String>,

    /// User account name (registration)
    #[arg(long, requires = "user_id")]
    pub user_name: Option<String>,

    /// User display name, defaults to the account name
    #[arg(long)]
    pub display_name: Option<String>,

    /// COSE algorithm identifier (repeatable, registration defaults to ES256)
    #[arg(long = "alg", value_name = "COSE", allow_hyphen_values = true)]
    pub algorithms: Vec<i32>,

    /// Output file for the encoded options
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

impl EncodeArgs {
    fn build(&self, kind: RequestKind) -> Result<CredentialOptions> {
        let challenge = parse_hex("challenge", &self.challenge)?;
        let mut builder = CredentialOptions::builder(self.rp_id.clone(), challenge)
            .user_verification(self.uv.into());

        if let Some(name) = &self.rp_name {
            builder = builder.rp_name(name.clone());
        }
        if let Some(ms) = self.timeout_ms {
            builder = builder.timeout_ms(ms);
        }
        for id in &self.allow {
            builder = builder.allow(CredentialDescriptor::new(parse_hex("allow", id)?));
        }
        for id in &self.exclude {
            builder = builder.exclude(CredentialDescriptor::new(parse_hex("exclude", id)?));
        }
        if let (Some(id), Some(name)) = (&self.user_id, &self.user_name) {
            let display = self.display_name.clone().unwrap_or_else(|| name.clone());
            builder = builder.user(parse_hex("user-id", id)?, name.clone(), display);
        }

        let mut algorithms = self.algorithms.clone();
        if algorithms.is_empty() && kind == RequestKind::Register {
            debug!("No algorithm given, defaulting to ES256");
            algorithms.push(COSE_ALG_ES256);
        }
        for alg in algorithms {
            builder = builder.algorithm(alg);
        }

        Ok(builder.build())
    }
}

/// Execute the encode command.
pub fn execute(args: EncodeArgs, quiet: bool) -> Result<()> {
    let kind: RequestKind = args.kind.into();
    let options = args.build(kind)?;

    if let Err(e) = options.validate(kind) {
        bail!("Invalid options for {kind}: {e}");
    }

    let bytes = codec::encode(&options).context("Invalid options: encoding failed")?;
    let token = CorrelationToken::from_digest(&codec::request_digest(kind, &bytes));

    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(path = %args.output.display(), bytes = bytes.len(), %kind, "Wrote options");

    if quiet {
        println!("{token}");
        return Ok(());
    }

    println!("{}", "Options encoded".green().bold());
    println!("  {:<8} {}", "Kind:".dimmed(), kind);
    println!("  {:<8} {}", "RP:".dimmed(), options.rp_id);
    println!("  {:<8} {} bytes", "Size:".dimmed(), bytes.len());
    println!("  {:<8} {}", "Output:".dimmed(), args.output.display());
    println!("  {:<8} {}", "Token:".dimmed(), token.as_str().cyan());
    Ok(())
}
