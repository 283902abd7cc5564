use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_JWT_PRIVATE_KEY: &str = "jwt-private-key";
pub const ARG_JWT_PUBLIC_KEY: &str = "jwt-public-key";
pub const ARG_ACCESS_TTL_MINUTES: &str = "access-ttl-minutes";
pub const ARG_REFRESH_TTL_DAYS: &str = "refresh-ttl-days";
pub const ARG_CAPABILITY_TIMEOUT_MS: &str = "capability-timeout-ms";
pub const ARG_INSECURE_COOKIES: &str = "insecure-cookies";

#[derive(Debug, Clone)]
pub struct Options {
    pub private_key_path: String,
    pub public_key_path: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub capability_timeout: Duration,
    pub insecure_cookies: bool,
}

impl Options {
    /// Parse credential arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a key path is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_required = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        let access_minutes = matches
            .get_one::<u64>(ARG_ACCESS_TTL_MINUTES)
            .copied()
            .unwrap_or(15);
        let refresh_days = matches
            .get_one::<u64>(ARG_REFRESH_TTL_DAYS)
            .copied()
            .unwrap_or(7);
        let timeout_ms = matches
            .get_one::<u64>(ARG_CAPABILITY_TIMEOUT_MS)
            .copied()
            .unwrap_or(250);

        Ok(Self {
            private_key_path: read_required(ARG_JWT_PRIVATE_KEY)?,
            public_key_path: read_required(ARG_JWT_PUBLIC_KEY)?,
            access_ttl: Duration::from_secs(access_minutes.saturating_mul(60)),
            refresh_ttl: Duration::from_secs(refresh_days.saturating_mul(24 * 60 * 60)),
            capability_timeout: Duration::from_millis(timeout_ms),
            insecure_cookies: matches.get_flag(ARG_INSECURE_COOKIES),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_PRIVATE_KEY)
                .long(ARG_JWT_PRIVATE_KEY)
                .help("Path to the ES256 private key (PEM, PKCS#8 or SEC1)")
                .env("REUNITE_JWT_PRIVATE_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_PUBLIC_KEY)
                .long(ARG_JWT_PUBLIC_KEY)
                .help("Path to the ES256 public key (PEM, SPKI)")
                .env("REUNITE_JWT_PUBLIC_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_MINUTES)
                .long(ARG_ACCESS_TTL_MINUTES)
                .help("Access token lifetime in minutes")
                .env("REUNITE_ACCESS_TTL_MINUTES")
                .default_value("15")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_DAYS)
                .long(ARG_REFRESH_TTL_DAYS)
                .help("Refresh token lifetime in days")
                .env("REUNITE_REFRESH_TTL_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CAPABILITY_TIMEOUT_MS)
                .long(ARG_CAPABILITY_TIMEOUT_MS)
                .help("Timeout for the administrator lookup, in milliseconds")
                .env("REUNITE_CAPABILITY_TIMEOUT_MS")
                .default_value("250")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIES)
                .long(ARG_INSECURE_COOKIES)
                .help("Drop the Secure flag from credential cookies (local HTTP only)")
                .env("REUNITE_INSECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
}
