//! Library for the input configuration types and configuration file loading using [`toml`] and
//! [`serde`]

#[macro_use]
extern crate tracing;
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::fs;

use serde::{Deserialize, Serialize};

/// Environment variable that disables the tablet driver integration entirely.
pub const IGNORE_WINTAB_ENV: &str = "CDK_IGNORE_WINTAB";

const fn default_true() -> bool {
    true
}

fn default_disable_wintab() -> bool {
    std::env::var_os(IGNORE_WINTAB_ENV).is_some()
}

fn default_library_name() -> String {
    "Wintab32.dll".to_string()
}

const fn default_max_queue_size() -> i32 {
    128
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub tablet: Tablet,
    pub devices: HashMap<String, PerDevice>,
    pub debug: Debug,
}

impl Config {
    /// Get the configured input mode for a device with this name, if any.
    pub fn device_mode(&self, name: &str) -> Option<InputMode> {
        self.devices.get(name).and_then(|device| device.mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Tablet {
    /// Skip loading the tablet driver.
    ///
    /// Defaults to whether `CDK_IGNORE_WINTAB` is present in the environment.
    #[serde(default = "default_disable_wintab")]
    pub disable: bool,
    /// The driver library file name, looked up in the system directory.
    #[serde(default = "default_library_name")]
    pub library_name: String,
    /// Ignore cursors with physical ID 0 on "WACOM Tablet" devices.
    ///
    /// Wacom drivers report duplicate cursors for pens and pucks that are not there.
    #[serde(default = "default_true")]
    pub skip_phantom_cursors: bool,
    /// The first packet queue size to request when opening a context.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: i32,
}

impl Default for Tablet {
    fn default() -> Self {
        Self {
            disable: default_disable_wintab(),
            library_name: default_library_name(),
            skip_phantom_cursors: true,
            max_queue_size: default_max_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub enum InputMode {
    Disabled,
    Screen,
    Window,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PerDevice {
    pub mode: Option<InputMode>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Debug {
    /// Dump every tablet context and cursor description while initializing.
    pub print_contexts: bool,
}

pub fn config_path() -> Option<PathBuf> {
    let Some(mut path) = dirs::config_dir() else {
        warn!("No configuration directory available, using default configuration");
        return None;
    };
    path.push("cdk");
    path.push("input.toml");
    Some(path)
}

/// Parse a configuration from TOML contents.
pub fn parse(contents: &str) -> Result<Config, Error> {
    Ok(toml::from_str(contents)?)
}

/// Load the configuration.
///
/// A missing file is not an error, the default configuration is returned instead.
pub fn load(path: Option<PathBuf>) -> Result<(Config, Option<PathBuf>), Error> {
    let Some(path) = path.or_else(config_path) else {
        return Ok((Config::default(), None));
    };
    debug!(?path, "Loading input configuration");

    let mut file = match fs::OpenOptions::new().read(true).open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(?path, "No configuration file, using defaults");
            return Ok((Config::default(), None));
        }
        Err(err) => return Err(err.into()),
    };

    let mut buf = String::new();
    let _ = file.read_to_string(&mut buf)?;
    let config = parse(&buf)?;

    Ok((config, Some(path)))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error occured when loading the configuration file: {0}")]
    Io(#[from] io::Error),
    #[error("An error occured while parsing the configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let config = parse("").unwrap();
        assert!(config.tablet.skip_phantom_cursors);
        assert_eq!(config.tablet.library_name, "Wintab32.dll");
        assert_eq!(config.tablet.max_queue_size, 128);
        assert!(config.devices.is_empty());
        assert!(!config.debug.print_contexts);
    }

    #[test]
    fn per_device_modes() {
        let config = parse(
            r#"
            [tablet]
            disable = true

            [devices."WACOM Tablet Pressure Stylus"]
            mode = "window"

            [devices."WACOM Tablet Eraser"]
            mode = "disabled"
            "#,
        )
        .unwrap();

        assert!(config.tablet.disable);
        assert_eq!(
            config.device_mode("WACOM Tablet Pressure Stylus"),
            Some(InputMode::Window)
        );
        assert_eq!(
            config.device_mode("WACOM Tablet Eraser"),
            Some(InputMode::Disabled)
        );
        assert_eq!(config.device_mode("Puck"), None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            parse("[tablet]\nqueue = 12\n"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse("[devices.pen]\nmode = \"relative\"\n"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("cdk-input-config-does-not-exist.toml");
        let (config, loaded_from) = load(Some(path)).unwrap();
        assert!(loaded_from.is_none());
        assert_eq!(config.tablet.max_queue_size, 128);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let path =
            std::env::temp_dir().join(format!("cdk-input-invalid-{}.toml", std::process::id()));
        fs::write(&path, "[tablet]\nmax-queue-size = \"big\"\n").unwrap();
        let result = load(Some(path.clone()));
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
