//! Token command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use fido_broker_core::{codec, CorrelationToken, RequestKind};
use tracing::debug;

use crate::utils::load_options;

/// Execute the token command.
///
/// The broker keys sessions on the canonical encoding, so the options are
/// re-encoded before hashing.
pub fn execute(kind: RequestKind, file: PathBuf, quiet: bool) -> Result<()> {
    let (bytes, options) = load_options(&file)?;

    if let Err(e) = options.validate(kind) {
        bail!("Invalid options for {kind}: {e}");
    }

    let canonical = codec::encode(&options).context("Invalid options: encoding failed")?;
    if canonical != bytes {
        debug!("File is not in canonical encoding");
    }
    let token = CorrelationToken::from_digest(&codec::request_digest(kind, &canonical));

    if quiet {
        println!("{token}");
    } else {
        println!("{} {}", format!("{kind} token:").dimmed(), token.as_str().cyan());
    }
    Ok(())
}
