use super::{load_config, Cli, ConfigCommands};
use crate::config::EdlConfig;
use anyhow::Result;
use std::path::Path;

pub fn run(cmd: &ConfigCommands, cli: &Cli) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(&cli.config),
        ConfigCommands::Show => show(cli),
    }
}

fn validate(config_path: &Path) -> Result<()> {
    let config = EdlConfig::load(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))?;

    let errors = config.validate();
    if errors.is_empty() {
        println!("✅ {} is valid.", config_path.display());
        return Ok(());
    }

    println!("❌ Validation errors in {}:", config_path.display());
    for e in &errors {
        println!("  - {}", e);
    }
    anyhow::bail!("{} problem(s) in {}", errors.len(), config_path.display())
}

fn show(cli: &Cli) -> Result<()> {
    let config = load_config(cli);
    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
    println!("{}", rendered);
    Ok(())
}
