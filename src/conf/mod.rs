//! Provides application configuration options.
//!
//! Options are read from (in the order of precedence, lowest first):
//! - default values;
//! - a TOML file named by the `--conf` command line argument or the
//!   `LOCAL_MEDIA_CONF` environment variable;
//! - `LOCAL_MEDIA_*` environment variables, sections separated by `__`
//!   (e.g. `LOCAL_MEDIA_EFFECTS__BLUR__EDGE_BLUR=2.5`).

pub mod devices;
pub mod effects;
pub mod log;
pub mod screen_share;
pub mod settings;

use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[doc(inline)]
pub use self::{
    devices::Devices,
    effects::{Blur, Effects, Segmenter, SegmenterModel},
    log::Log,
    screen_share::ScreenShare,
    settings::Settings,
};

/// CLI argument that is responsible for holding application configuration
/// file path.
static APP_CONF_PATH_CMD_ARG_NAME: &str = "--conf";

/// Environment variable that is responsible for holding application
/// configuration file path.
static APP_CONF_PATH_ENV_VAR_NAME: &str = "LOCAL_MEDIA_CONF";

/// Holds application config.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Conf {
    /// Logging settings.
    pub log: Log,

    /// Device acquisition settings.
    pub devices: Devices,

    /// Track effects settings.
    pub effects: Effects,

    /// Screen sharing settings.
    pub screen_share: ScreenShare,

    /// Persisted user settings storage.
    pub settings: Settings,
}

impl Conf {
    /// Creates new [`Conf`] and applies values from such sources
    /// and in that order:
    /// - default values;
    /// - configuration file, the name of which is given as a command line
    ///   parameter or environment variable;
    /// - environment variables.
    ///
    /// # Errors
    ///
    /// Errors if parsing fails.
    pub fn parse() -> Result<Self, ConfigError> {
        let mut cfg = Config::new();

        let path = get_conf_file_name(
            env::var(APP_CONF_PATH_ENV_VAR_NAME),
            env::args(),
        );
        if let Some(path) = path {
            cfg.merge(File::with_name(&path))?;
        }

        cfg.merge(Environment::with_prefix("LOCAL_MEDIA").separator("__"))?;

        cfg.try_into()
    }
}

/// Returns the path to a configuration file, if it's set via CLI `args`
/// or via the provided `env_var`.
fn get_conf_file_name<T>(
    env_var: Result<String, env::VarError>,
    args: T,
) -> Option<String>
where
    T: IntoIterator<Item = String>,
{
    if let Ok(path) = env_var {
        if !path.is_empty() {
            return Some(path);
        }
    }
    let mut args = args
        .into_iter()
        .skip_while(|x| x != APP_CONF_PATH_CMD_ARG_NAME);
    if args.next().is_some() {
        args.next().filter(|v| !v.is_empty())
    } else {
        None
    }
}
