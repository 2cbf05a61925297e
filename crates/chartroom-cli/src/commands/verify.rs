//! Verify command - check a chart archive against its provenance file

use std::path::Path;

use chartroom_repo::provenance::Verification;
use chartroom_repo::{RepoError, verify_chart};
use console::style;

use crate::error::Result;

pub fn run(archive: &Path, keyring: &Path, json: bool) -> Result<()> {
    let verification =
        verify_chart(archive, keyring).map_err(|source| RepoError::VerificationFailed {
            archive: archive.to_path_buf(),
            source,
        })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&verification)?);
    } else {
        println!(
            "{} {}",
            style("Verified").green().bold(),
            archive.display()
        );
        print_verification(&verification);
    }
    Ok(())
}

/// Signer, key and digest of a successful verification
pub fn print_verification(verification: &Verification) {
    println!("  {}: {}", style("Signed by").dim(), verification.signed_by);
    println!("  {}: {}", style("Using key").dim(), verification.key);
    println!(
        "  {}: {}",
        style("Chart hash verified").dim(),
        verification.file_hash
    );
}
