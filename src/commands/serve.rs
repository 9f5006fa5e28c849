use anyhow::Result;
use slack_mcp::config::Config;

pub fn execute(config: &Config) -> Result<()> {
    slack_mcp::mcp::run_mcp_server(config)
}
