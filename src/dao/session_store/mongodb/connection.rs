use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::debug;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Ping attempts made before the initial connection is reported dead.
const PING_ATTEMPTS: u32 = 10;
/// Backoff between ping attempts, doubled up to the ceiling.
const FIRST_RETRY: Duration = Duration::from_millis(250);
const MAX_RETRY: Duration = Duration::from_secs(5);

/// Build a client from the parsed options and ping the server until it
/// answers. The session store is only handed out once a ping has succeeded,
/// so a booting database shows up as degraded mode rather than failed calls.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempt = 0;
    let mut retry = FIRST_RETRY;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(source) => {
                if attempt >= PING_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing {
                        attempts: attempt,
                        source,
                    });
                }
                debug!(attempt, error = %source, "MongoDB ping failed; retrying");
                sleep(retry).await;
                retry = (retry * 2).min(MAX_RETRY);
            }
        }
    }

    Ok((client, database))
}
