use anyhow::{bail, Context, Result};
use std::sync::Arc;

use slack_mcp::config::Config;
use slack_mcp::search::{SearchRequest, SmartSearch};
use slack_mcp::slack::SlackClient;

pub fn execute(
    config: &Config,
    query: String,
    channel: Option<String>,
    max_results: usize,
    include_summary: bool,
) -> Result<()> {
    let Some(client) =
        SlackClient::from_config(&config.slack).context("Failed to create Slack client")?
    else {
        bail!("SLACK_BOT_TOKEN is not set");
    };

    let engine = SmartSearch::from_config(Arc::new(client), config);
    let request = SearchRequest {
        query,
        channel_id: channel,
        max_results,
        include_summary,
    };
    println!("{}", engine.search(&request));
    Ok(())
}
