use anyhow::{Context, Result};
use slack_mcp::config::Config;
use slack_mcp::mcp::{list_channels, NOT_INITIALIZED};
use slack_mcp::slack::SlackClient;

pub fn execute(config: &Config) -> Result<()> {
    let client =
        SlackClient::from_config(&config.slack).context("Failed to create Slack client")?;

    match client {
        Some(client) => print!("{}", list_channels(&client)),
        None => println!("{}", NOT_INITIALIZED),
    }
    Ok(())
}
