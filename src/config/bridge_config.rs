use crate::config::helper::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long to wait for the page before treating a request as unanswered
    #[serde(
        default = "default_response_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub response_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port: default_port(),
            response_timeout: default_response_timeout(),
        }
    }
}

fn default_port() -> u16 {
    9990
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_response_timeout() -> Duration {
    Duration::from_millis(1500)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bridge_config() {
        let config = BridgeConfig::default();
        assert!(config.enabled);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9990);
        assert_eq!(config.response_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_bridge_config_deserialization() {
        let yaml = r#"
enabled: false
host: "0.0.0.0"
port: 8080
response_timeout: 3s
"#;
        let config: BridgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.response_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_bridge_config_partial_deserialization() {
        let yaml = r#"
port: 8000
"#;
        let config: BridgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.enabled); // default
        assert_eq!(config.host, "localhost"); // default
        assert_eq!(config.port, 8000); // specified
        assert_eq!(config.response_timeout, Duration::from_millis(1500)); // default
    }
}
