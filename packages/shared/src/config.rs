use std::fmt;
use std::time::Duration;

/// How move and reset submissions guard against concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Compare-and-swap on the revision of the snapshot the action was based on.
    Conditional,
    /// Last write wins.
    Blind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub matches_table: String,
    pub users_table: String,
    pub poll_interval: Duration,
    pub update_policy: UpdatePolicy,
    pub computer_move_delay: Duration,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Invalid { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            matches_table: "matches".to_string(),
            users_table: "users".to_string(),
            poll_interval: Duration::from_millis(500),
            update_policy: UpdatePolicy::Conditional,
            computer_move_delay: Duration::from_millis(400),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults
    /// for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let update_policy = match lookup("UPDATE_POLICY") {
            None => defaults.update_policy,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "conditional" => UpdatePolicy::Conditional,
                "blind" => UpdatePolicy::Blind,
                _ => return Err(invalid("UPDATE_POLICY", &value)),
            },
        };

        // The poller's interval timer needs a non-zero period.
        let poll_interval = millis(&lookup, "SNAPSHOT_POLL_INTERVAL_MS", defaults.poll_interval)?;
        if poll_interval.is_zero() {
            let raw = lookup("SNAPSHOT_POLL_INTERVAL_MS").unwrap_or_default();
            return Err(invalid("SNAPSHOT_POLL_INTERVAL_MS", &raw));
        }

        Ok(AppConfig {
            matches_table: lookup("MATCHES_TABLE").unwrap_or(defaults.matches_table),
            users_table: lookup("USERS_TABLE").unwrap_or(defaults.users_table),
            poll_interval,
            update_policy,
            computer_move_delay: millis(
                &lookup,
                "COMPUTER_MOVE_DELAY_MS",
                defaults.computer_move_delay,
            )?,
        })
    }
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid(key, &value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}
