#![cfg(not(tarpaulin_include))]

use csvhub::app;

/// Main entry point for the web application.
///
/// Starts the API server; the bind address, data directory and SMTP
/// settings come from environment variables (see the config module).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    app::run().await
}
