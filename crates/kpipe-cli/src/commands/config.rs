use crate::GlobalOpts;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use kpipe_config::Config;
use kpipe_logger as logger;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show all configured values
    Show,
    /// Print one value
    Get { key: String },
    /// Set a value (globs are comma separated)
    Set { key: String, value: String },
    /// Remove all configured values
    Reset,
    /// Print the path of the configuration file
    Path,
}

pub fn handle_config(action: Option<ConfigAction>, opts: &GlobalOpts) -> Result<()> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            if let Some(value) = config.get(&key)? {
                println!("{}", value);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            logger::success(&format!("Set {} = {}", key, value));
        }
        ConfigAction::Reset => {
            let mut config = Config::load()?;
            config.reset();
            config.save()?;
            logger::success("Configuration reset");
        }
        ConfigAction::Path => {
            let path = Config::path()?;
            logger::debug(&format!("Reading config from: {}", path.display()));
            println!("{}", path.display());
        }
    }
    Ok(())
}
