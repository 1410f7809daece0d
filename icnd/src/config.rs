use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use icn_common::ConnectionId;
use icn_core::Name;
use icn_forwarder::{ForwarderConfig, Route, RouteOrigin, StrategyKind};
use icn_raaqm::RaaqmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/icn/icnd.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub forwarder: ForwarderConfig,
    pub connections: Vec<ConnectionConfig>,
    pub routes: Vec<RouteConfig>,
    pub strategies: Vec<StrategyConfig>,
    /// Parameters for consumer applications attached to this forwarder
    pub raaqm: RaaqmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub name: String,
    /// Period of the status log line, 0 disables it
    pub stats_interval_secs: u64,
}

/// A connection created at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub id: ConnectionId,
    /// Application on this host rather than a remote forwarder
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub connection_id: ConnectionId,
    #[serde(default = "default_cost")]
    pub cost: u32,
}

fn default_cost() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub prefix: String,
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            name: "icnd".to_string(),
            stats_interval_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            forwarder: ForwarderConfig::default(),
            connections: Vec::new(),
            routes: Vec::new(),
            strategies: Vec::new(),
            raaqm: RaaqmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            if seen.contains(&connection.id) {
                bail!("connection {} is declared twice", connection.id);
            }
            seen.push(connection.id);
        }

        self.routes()?;
        self.strategies()?;
        self.raaqm.validate().context("invalid [raaqm] section")?;
        Ok(())
    }

    /// Configured routes, with their prefixes parsed
    pub fn routes(&self) -> Result<Vec<Route>> {
        self.routes
            .iter()
            .map(|route| {
                let prefix = Name::parse(&route.prefix)
                    .with_context(|| format!("route prefix {:?}", route.prefix))?;
                Ok(Route::new(prefix, route.connection_id)
                    .with_cost(route.cost)
                    .with_origin(RouteOrigin::Static))
            })
            .collect()
    }

    pub fn strategies(&self) -> Result<Vec<(Name, StrategyKind)>> {
        self.strategies
            .iter()
            .map(|entry| {
                let prefix = Name::parse(&entry.prefix)
                    .with_context(|| format!("strategy prefix {:?}", entry.prefix))?;
                Ok((prefix, entry.strategy))
            })
            .collect()
    }
}
