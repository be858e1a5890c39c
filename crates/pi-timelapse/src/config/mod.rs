#[allow(clippy::module_inception)]
mod config;
mod logging_config;

pub(crate) use {config::Config, logging_config::LoggingConfig};

/// Environment variable overriding the config file location.
pub(crate) const CONFIG_PATH_ENV: &str = "PI_TIMELAPSE_CONFIG";
pub(crate) const DEFAULT_LOG_FILTER: &str = "pi_timelapse=info,pi_timelapse_core=info";
pub(crate) const DEFAULT_LOG_FILE_PREFIX: &str = "pi-timelapse.log";

pub(crate) fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
