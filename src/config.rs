use crate::error::Error;

/// Authentication settings for the SMTP relay
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmtpAuth {
    pub mechanism: AuthMechanism,
    pub username: String,
    pub password: String,
}

/// SASL mechanism used when authenticating to the relay
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AuthMechanism {
    Plain,
    Login,
}

/// Settings for the SMTP relay that deliveries go through
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub domain_name: String,
    pub port: u16,
    pub use_tls: bool,
    pub auth: Option<SmtpAuth>,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            domain_name: "localhost".to_string(),
            port: 25,
            use_tls: true,
            auth: None,
        }
    }
}

/// Mailfan configuration settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name used on the right-hand side of generated message ids, and as
    /// the HELO name when talking to the relay
    pub helo_name: String,

    /// Base URL that open-tracking pixels and rewritten links point at
    pub tracking_host: String,

    pub smtp_timeout_secs: u64,

    /// Refuse to deliver if the relay does not offer STARTTLS
    pub require_tls: bool,

    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            helo_name: "localhost".to_string(),
            tracking_host: "https://track.localhost".to_string(),
            smtp_timeout_secs: 60,
            require_tls: false,
            relay: Default::default(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Config, Error> {
        let config: Config = toml::from_str(s)?;
        Ok(config)
    }

    pub fn is_valid(&self) -> bool {
        !self.helo_name.is_empty()
            && !self.relay.domain_name.is_empty()
            && !(self.require_tls && !self.relay.use_tls)
    }
}
