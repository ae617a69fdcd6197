//! Tuple Space Reference Client
//!
//! Replays a request file against a server, printing every request with
//! its response.
//!
//! ```text
//! tuplespace-client 127.0.0.1 51234 requests.txt
//! ```

use anyhow::Context;
use clap::Parser;
use tuplespace::client::TupleClient;
use tuplespace::config::{init_tracing, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::parse();

    init_tracing("warn");

    let script = tokio::fs::read_to_string(&config.request_file)
        .await
        .with_context(|| format!("could not read {}", config.request_file.display()))?;

    let address = config.server_address();
    let mut client = TupleClient::connect(address.as_str())
        .await
        .with_context(|| format!("could not connect to {}", address))?;

    let mut stdout = std::io::stdout().lock();
    let summary = client
        .replay(&script, &mut stdout)
        .await
        .with_context(|| format!("replay against {} failed", address))?;

    eprintln!("{} requests sent, {} lines skipped", summary.sent, summary.skipped);
    Ok(())
}
