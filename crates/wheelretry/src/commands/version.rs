//! Version command

use std::fmt;

use anyhow::Result;
use serde::Serialize;
use wheelretry_core::SchedulerConfig;

use crate::cli::VersionArgs;

/// What `wheelretry version` reports
///
/// Build metadata is embedded by `build.rs`. The default scheduler shape is
/// included so a report shows which wheel a bare `wheelretry run` would use.
#[derive(Debug, Serialize)]
struct BuildInfo {
    version: &'static str,
    commit: Option<&'static str>,
    build_date: Option<&'static str>,
    target: Option<&'static str>,
    default_tick_ms: u64,
    default_ticks_per_wheel: u32,
}

impl BuildInfo {
    fn current() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GIT_SHA"),
            build_date: option_env!("BUILD_DATE"),
            target: option_env!("TARGET"),
            default_tick_ms: scheduler.tick_duration_ms,
            default_ticks_per_wheel: scheduler.ticks_per_wheel,
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wheelretry {}", self.version)?;
        match (self.commit, self.build_date) {
            (Some(commit), Some(date)) => write!(f, " ({} {})", commit, date),
            (Some(only), None) | (None, Some(only)) => write!(f, " ({})", only),
            (None, None) => Ok(()),
        }
    }
}

pub fn run(args: VersionArgs) -> Result<()> {
    let info = BuildInfo::current();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", info);
    if let Some(target) = info.target {
        println!("target: {}", target);
    }
    println!(
        "default wheel: {} buckets of {}ms",
        info.default_ticks_per_wheel, info.default_tick_ms
    );
    Ok(())
}
