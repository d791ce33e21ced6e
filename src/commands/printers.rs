use crate::config::Config;
use anyhow::Result;

pub fn run(config: &Config) -> Result<()> {
    match config.backend().default_device() {
        Ok(device) => println!("Default printer: {}", device),
        Err(e) => println!("No printer available: {}", e),
    }
    Ok(())
}
