//! Shared utility functions

use camino::Utf8PathBuf;

use crate::error::{Error, Result};

/// Name of the per-user configuration directory under the home directory
pub const CONFIG_DIR_NAME: &str = ".wheelretry";

/// Get the user's home directory
///
/// Prefers the HOME environment variable over `dirs::home_dir()`, which reads
/// the password database and ignores overrides.
pub fn get_home_dir() -> Result<Utf8PathBuf> {
    let home = match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => std::path::PathBuf::from(home),
        _ => dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?,
    };

    Utf8PathBuf::from_path_buf(home).map_err(|path| {
        Error::invalid_config(format!(
            "Home directory is not valid UTF-8: {}",
            path.display()
        ))
    })
}

/// Get the default configuration directory (`~/.wheelretry`)
pub fn default_config_dir() -> Result<Utf8PathBuf> {
    Ok(get_home_dir()?.join(CONFIG_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_home_dir_from_env() {
        let original = std::env::var("HOME").ok();
        std::env::set_var("HOME", "/tmp/wheelretry-home");

        assert_eq!(get_home_dir().unwrap(), "/tmp/wheelretry-home");
        assert_eq!(
            default_config_dir().unwrap(),
            "/tmp/wheelretry-home/.wheelretry"
        );

        match original {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }
    }
}
