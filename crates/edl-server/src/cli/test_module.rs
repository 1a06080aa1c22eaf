use crate::config::EdlConfig;
use anyhow::Result;

pub fn run(config: &EdlConfig) -> Result<()> {
    config.check()?;
    println!("ok");
    Ok(())
}
