use serde::Deserialize;

/// Complete hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Listening endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4949
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Request scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Per-client maximum request wait before a CONFIG update arrives (seconds)
    #[serde(default = "default_max_wait_seconds")]
    pub default_max_wait_seconds: f64,
    /// Fixed processing cost reserved at each request deadline (milliseconds)
    #[serde(default = "default_computation_budget_ms")]
    pub computation_budget_ms: u64,
}

fn default_max_wait_seconds() -> f64 {
    2.0
}

fn default_computation_budget_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_wait_seconds: default_max_wait_seconds(),
            computation_budget_ms: default_computation_budget_ms(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<HubConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: HubConfig = toml::from_str(&contents)?;
    Ok(config)
}
