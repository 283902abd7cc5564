use crate::keys::Keypair;
use anyhow::{Context, Result};
use std::{fs::OpenOptions, io::Write, path::Path};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub private_key_out: String,
    pub public_key_out: String,
}

/// Generate a keypair and write both PEM files. Existing files are never overwritten.
/// # Errors
/// Returns an error if encoding fails or either file cannot be created.
pub fn execute(args: &Args) -> Result<()> {
    let (private_pem, public_pem) = Keypair::generate()
        .to_pem()
        .context("Failed to encode keypair")?;

    write_new(Path::new(&args.private_key_out), &private_pem, 0o600)?;
    write_new(Path::new(&args.public_key_out), &public_pem, 0o644)?;

    info!(
        private = %args.private_key_out,
        public = %args.public_key_out,
        "keypair written"
    );

    Ok(())
}

fn write_new(path: &Path, contents: &str, mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
