use crate::broker::{DEFAULT_CODE_WIDTH, MAX_CODE_WIDTH};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_CODE_WIDTH: &str = "code-width";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub ttl: Duration,
    pub width: u32,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            ttl: Duration::from_secs(
                matches
                    .get_one::<u64>(ARG_CODE_TTL_SECONDS)
                    .copied()
                    .unwrap_or(900),
            ),
            width: matches
                .get_one::<u32>(ARG_CODE_WIDTH)
                .copied()
                .unwrap_or(DEFAULT_CODE_WIDTH),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Lifetime of a relay code in seconds")
                .env("REUNITE_CODE_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CODE_WIDTH)
                .long(ARG_CODE_WIDTH)
                .help("Number of digits in a relay code")
                .env("REUNITE_CODE_WIDTH")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..=i64::from(MAX_CODE_WIDTH))),
        )
}
