use std::{fmt, num::ParseFloatError, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::pacer::Jitter;

/// The objective the utility layer steers toward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityMode {
    ConstantDelta,
    PfabricFct,
    BoundedDelay,
    BoundedDelayEnd,
    BoundedQdelayEnd,
    BoundedPercentileDelayEnd,
    BoundedFdelayEnd,
    MaxThroughput,
    TcpCoop,
}

impl UtilityMode {
    const ALL: [UtilityMode; 9] = [
        UtilityMode::ConstantDelta,
        UtilityMode::PfabricFct,
        UtilityMode::BoundedDelay,
        UtilityMode::BoundedDelayEnd,
        UtilityMode::BoundedQdelayEnd,
        UtilityMode::BoundedPercentileDelayEnd,
        UtilityMode::BoundedFdelayEnd,
        UtilityMode::MaxThroughput,
        UtilityMode::TcpCoop,
    ];

    /// The name used in configuration strings.
    pub fn name(self) -> &'static str {
        match self {
            UtilityMode::ConstantDelta => "constant_delta",
            UtilityMode::PfabricFct => "pfabric_fct",
            UtilityMode::BoundedDelay => "bounded_delay",
            UtilityMode::BoundedDelayEnd => "bounded_delay_end",
            UtilityMode::BoundedQdelayEnd => "bounded_qdelay_end",
            UtilityMode::BoundedPercentileDelayEnd => "bounded_percentile_delay_end",
            UtilityMode::BoundedFdelayEnd => "bounded_fdelay_end",
            UtilityMode::MaxThroughput => "max_throughput",
            UtilityMode::TcpCoop => "tcp_coop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|mode| mode.name() == name)
    }

    /// Whether the mode's first parameter is a delay bound, in seconds.
    pub fn takes_delay_bound(self) -> bool {
        matches!(
            self,
            UtilityMode::BoundedDelay
                | UtilityMode::BoundedDelayEnd
                | UtilityMode::BoundedQdelayEnd
                | UtilityMode::BoundedPercentileDelayEnd
                | UtilityMode::BoundedFdelayEnd
        )
    }
}

impl fmt::Display for UtilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a configuration string was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown utility mode {0:?}")]
    UnknownMode(String),
    #[error("utility mode {0} needs a parameter")]
    MissingParam(UtilityMode),
    #[error("bad parameter {param:?} for utility mode {mode}")]
    BadParam {
        mode: UtilityMode,
        param: String,
        #[source]
        source: ParseFloatError,
    },
}

/// A parsed `<mode>[:<param>...]` string.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilityConfig {
    pub mode: UtilityMode,
    pub delta: f64,
    /// Only set by the `bounded_*` modes.
    pub delay_bound: Option<f64>,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            mode: UtilityMode::ConstantDelta,
            delta: 1.0,
            delay_bound: None,
        }
    }
}

impl FromStr for UtilityConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let name = parts.next().unwrap_or_default();
        let mode =
            UtilityMode::from_name(name).ok_or_else(|| ConfigError::UnknownMode(s.to_string()))?;
        let mut first_param = || -> Result<f64, ConfigError> {
            let param = parts
                .next()
                .filter(|p| !p.trim().is_empty())
                .ok_or(ConfigError::MissingParam(mode))?;
            param
                .trim()
                .parse::<f64>()
                .map_err(|source| ConfigError::BadParam {
                    mode,
                    param: param.to_string(),
                    source,
                })
        };
        let mut config = UtilityConfig {
            mode,
            ..Default::default()
        };
        if mode == UtilityMode::ConstantDelta {
            config.delta = first_param()?;
        } else if mode.takes_delay_bound() {
            config.delay_bound = Some(first_param()?);
        }
        Ok(config)
    }
}

/// Tunables of the controller itself, as opposed to the objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovianConfig {
    /// Initial window, and how many acks to collect before the control law kicks in.
    pub num_probe_pkts: u64,
    /// Fraction of the pseudo-delay that survives one min-RTT without acks.
    pub delta_decay_rate: f64,
    /// Decay horizon of every moving average, in round trips.
    pub ema_horizon: f64,
    /// Retransmission timeout suggested to the driver, in milliseconds.
    pub timeout_ms: f64,
    /// How many recent delay samples the percentile tracker keeps.
    pub percentile_window: usize,
    pub jitter: Jitter,
    pub jitter_seed: u64,
}

impl Default for MarkovianConfig {
    fn default() -> Self {
        Self {
            num_probe_pkts: 10,
            delta_decay_rate: 0.8,
            ema_horizon: 1.0,
            timeout_ms: 1000.0,
            percentile_window: 1000,
            jitter: Jitter::None,
            jitter_seed: 0,
        }
    }
}

impl MarkovianConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
