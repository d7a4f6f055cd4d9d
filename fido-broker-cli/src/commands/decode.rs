//! Decode command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use fido_broker_core::{CredentialDescriptor, CredentialOptions, RequestKind};
use serde_json::{json, Value};

use crate::utils::load_options;

fn descriptors_json(descriptors: &[CredentialDescriptor]) -> Value {
    descriptors
        .iter()
        .map(|d| json!({ "id": hex::encode(&d.id), "transports": d.transports }))
        .collect()
}

/// JSON view with binary fields rendered as hex.
fn options_json(options: &CredentialOptions) -> Value {
    json!({
        "rp_id": options.rp_id,
        "rp_name": options.rp_name,
        "challenge": hex::encode(&options.challenge),
        "user": options.user.as_ref().map(|u| json!({
            "id": hex::encode(&u.id),
            "name": u.name,
            "display_name": u.display_name,
        })),
        "algorithms": options.algorithms,
        "allow_credentials": descriptors_json(&options.allow_credentials),
        "exclude_credentials": descriptors_json(&options.exclude_credentials),
        "user_verification": options.user_verification,
        "timeout_ms": options.timeout_ms,
        "valid_for": valid_kinds(options),
    })
}

fn valid_kinds(options: &CredentialOptions) -> Vec<RequestKind> {
    [RequestKind::Register, RequestKind::Sign]
        .into_iter()
        .filter(|kind| options.validate(*kind).is_ok())
        .collect()
}

/// Execute the decode command.
pub fn execute(file: PathBuf, as_json: bool, quiet: bool) -> Result<()> {
    let (bytes, options) = load_options(&file)?;

    if as_json {
        let rendered =
            serde_json::to_string_pretty(&options_json(&options)).context("Failed to render JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    let kinds = valid_kinds(&options);
    if quiet {
        let names: Vec<_> = kinds.iter().map(|k| k.as_str()).collect();
        println!("{}", names.join(","));
        return Ok(());
    }

    println!("{}", "Options decoded".green().bold());
    println!("  {:<12} {} bytes", "Size:".dimmed(), bytes.len());
    println!("  {:<12} {}", "RP:".dimmed(), options.rp_id);
    if let Some(name) = &options.rp_name {
        println!("  {:<12} {}", "RP name:".dimmed(), name);
    }
    println!("  {:<12} {}", "Challenge:".dimmed(), hex::encode(&options.challenge));
    if let Some(user) = &options.user {
        println!("  {:<12} {} ({})", "User:".dimmed(), user.name, hex::encode(&user.id));
    }
    if !options.algorithms.is_empty() {
        println!("  {:<12} {:?}", "Algorithms:".dimmed(), options.algorithms);
    }
    println!("  {:<12} {}", "Allowed:".dimmed(), options.allow_credentials.len());
    println!("  {:<12} {}", "Excluded:".dimmed(), options.exclude_credentials.len());
    println!("  {:<12} {:?}", "UV:".dimmed(), options.user_verification);
    match options.timeout_ms {
        Some(ms) if ms > 0 => println!("  {:<12} {} ms", "Timeout:".dimmed(), ms),
        _ => println!("  {:<12} broker default", "Timeout:".dimmed()),
    }

    for kind in [RequestKind::Register, RequestKind::Sign] {
        match options.validate(kind) {
            Ok(()) => println!("  {:<12} {}", format!("{kind}:").dimmed(), "dispatchable".green()),
            Err(e) => println!("  {:<12} {}", format!("{kind}:").dimmed(), e.to_string().yellow()),
        }
    }
    Ok(())
}
