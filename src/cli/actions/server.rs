use crate::{
    api::{self, AppState},
    auth::AuthGate,
    broker::{spawn_janitor, CodeBroker},
    cli::telemetry,
    keys::Keypair,
    lookup::CollarLookupFlow,
    storage::{PgCapabilityLookup, PgCollarDirectory},
    token::{TokenService, TokenTtls},
};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub private_key_path: String,
    pub public_key_path: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub capability_timeout: Duration,
    pub insecure_cookies: bool,
    pub code_ttl: Duration,
    pub code_width: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing keys cannot be loaded, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    // Keys first: nothing is served without them.
    let keys = Keypair::load(&args.private_key_path, &args.public_key_path)
        .context("Failed to load JWT signing keys")?;

    let tokens = Arc::new(TokenService::new(
        keys,
        TokenTtls {
            access: args.access_ttl,
            refresh: args.refresh_ttl,
        },
    ));

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    if args.insecure_cookies {
        warn!("Credential cookies are issued without the Secure flag");
    }

    let gate = AuthGate::new(tokens, Arc::new(PgCapabilityLookup::new(pool.clone())))
        .with_lookup_timeout(args.capability_timeout)
        .with_cookie_secure(!args.insecure_cookies);

    let broker = Arc::new(CodeBroker::new(args.code_width));
    let janitor = spawn_janitor(broker.clone(), JANITOR_INTERVAL);

    let lookup = CollarLookupFlow::new(
        Arc::new(PgCollarDirectory::new(pool)),
        broker,
        args.code_ttl,
    );

    info!(
        code_width = args.code_width,
        code_ttl_seconds = args.code_ttl.as_secs(),
        "relay code broker ready"
    );

    let result = api::serve(
        args.port,
        AppState {
            gate: Arc::new(gate),
            lookup: Arc::new(lookup),
        },
    )
    .await;

    janitor.abort();
    telemetry::shutdown_tracer();

    result
}
