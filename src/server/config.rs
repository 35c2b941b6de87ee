use super::RequestsLoggingLevel;
use crate::config::AuthSettings;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub host: String,
    pub port: u16,
    /// Checks applied to `POST /update_asset` before anything else.
    pub auth: AuthSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            host: "0.0.0.0".to_string(),
            port: 12345,
            auth: AuthSettings::default(),
        }
    }
}
