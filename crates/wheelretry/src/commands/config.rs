//! Config command

use anyhow::{Context, Result};
use camino::Utf8Path;
use wheelretry_core::config::ConfigLoader;
use wheelretry_core::types::WheelRetryConfig;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, config_path: Option<&Utf8Path>) -> Result<()> {
    let loader = ConfigLoader::new()?;
    match cmd {
        ConfigCommands::Show(args) => show(&loader, args, config_path),
        ConfigCommands::Validate => validate(&loader, config_path),
    }
}

fn show(loader: &ConfigLoader, args: ConfigShowArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = loader.load(config_path)?;
    println!("{}", render(&config, args.json)?);
    Ok(())
}

fn validate(loader: &ConfigLoader, config_path: Option<&Utf8Path>) -> Result<()> {
    let source = loader.config_file(config_path)?;
    let config = loader.load(config_path)?;
    config.validate().context("Configuration is invalid")?;

    match &source {
        Some(path) => output::success(&format!("Configuration is valid: {}", path)),
        None => {
            output::success("Configuration is valid");
            output::info(&format!(
                "No {} found, using defaults and environment",
                loader.default_config_path()
            ));
        }
    }

    output::header("Scheduler");
    output::kv(
        "Tick",
        &format!("{}ms", config.scheduler.tick_duration_ms),
    );
    output::kv(
        "Ticks per wheel",
        &config.scheduler.ticks_per_wheel.to_string(),
    );
    output::kv("Thread prefix", &config.scheduler.thread_name_prefix);

    output::header("Retry");
    output::kv(
        "Delay",
        &format!("{} {}", config.retry.delay, config.retry.delay_unit),
    );
    output::kv("Max attempts", &config.retry.max_attempts.to_string());
    output::kv(
        "Total invocations",
        &config.retry.total_invocations().to_string(),
    );

    Ok(())
}

/// Serialize the resolved configuration as YAML or pretty JSON
fn render(config: &WheelRetryConfig, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(serde_yaml_ng::to_string(config)?.trim_end().to_string())
    }
}
