use std::sync::Arc;

use anyhow::Result;

use aternos_bot::config::Config;
use aternos_bot::{discord, keepalive};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration comes from the environment and is validated once; a
    // missing required variable is fatal before anything else runs.
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("\u{274c} Error: {err}");
            std::process::exit(1);
        }
    };

    // Keep-alive endpoint for the hosting platform's liveness probe; serves
    // independently of everything else for the life of the process.
    tokio::spawn(keepalive::serve(config.keepalive_port));

    println!("Starting bot...");
    let bot = discord::Bot::connect(config).await?;
    bot.run().await
}
