use anyhow::Result;
use slack_mcp::config::{default_path, Config};

pub fn execute(config: &Config) -> Result<()> {
    match default_path() {
        Some(path) if path.exists() => println!("# default config file: {}", path.display()),
        Some(path) => println!("# default config file: {} (not present)", path.display()),
        None => println!("# no config directory on this platform"),
    }
    println!("# semantic ranking: {}", config.semantic_enabled());
    print!("{}", config.to_redacted_toml()?);
    Ok(())
}
