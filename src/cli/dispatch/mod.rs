//! Map validated CLI arguments to an action: `keygen` when the subcommand is
//! present, otherwise the API server with its full configuration.

use crate::cli::actions::{keygen, server, Action};
use crate::cli::commands::{self, codes, tokens};
use anyhow::{Context, Result};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches(commands::keygen::CMD_KEYGEN) {
        let read = |id: &str| -> Result<String> {
            sub.get_one::<String>(id)
                .cloned()
                .with_context(|| format!("missing required argument: --{id}"))
        };
        return Ok(Action::Keygen(keygen::Args {
            private_key_out: read(commands::keygen::ARG_PRIVATE_KEY_OUT)?,
            public_key_out: read(commands::keygen::ARG_PUBLIC_KEY_OUT)?,
        }));
    }

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let token_opts = tokens::Options::parse(matches)?;
    let code_opts = codes::Options::parse(matches);

    Ok(Action::Server(server::Args {
        port,
        dsn,
        private_key_path: token_opts.private_key_path,
        public_key_path: token_opts.public_key_path,
        access_ttl: token_opts.access_ttl,
        refresh_ttl: token_opts.refresh_ttl,
        capability_timeout: token_opts.capability_timeout,
        insecure_cookies: token_opts.insecure_cookies,
        code_ttl: code_opts.ttl,
        code_width: code_opts.width,
    }))
}
