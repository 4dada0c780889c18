use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted when the policy is [`SchedulePolicy::Runtime`]
pub const RUNTIME_SCHEDULE_ENV: &str = "PRIMESWEEP_RUNTIME_SCHEDULE";

/// How the range is split into chunks and handed to workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePolicy {
    /// One contiguous block per worker, fixed up front
    #[default]
    Static,
    /// Fixed-size chunks pulled from a shared queue on demand
    Dynamic,
    /// Queue chunks that shrink as the remaining work drains
    Guided,
    /// Resolved from a [`ScheduleSource`] when the sweep starts
    Runtime,
}

impl SchedulePolicy {
    pub fn label(&self) -> &'static str {
        match self {
            SchedulePolicy::Static => "static",
            SchedulePolicy::Dynamic => "dynamic",
            SchedulePolicy::Guided => "guided",
            SchedulePolicy::Runtime => "runtime",
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SchedulePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(SchedulePolicy::Static),
            "dynamic" => Ok(SchedulePolicy::Dynamic),
            "guided" => Ok(SchedulePolicy::Guided),
            "runtime" => Ok(SchedulePolicy::Runtime),
            other => bail!(
                "unsupported schedule '{other}' (expected static, dynamic, guided or runtime)"
            ),
        }
    }
}

/// A scheduling policy plus an optional chunk size.
///
/// Written as `kind[,chunk]`, e.g. `dynamic,500` or `guided`. What the chunk size
/// means depends on the policy:
///
/// - `static`: without a chunk size each worker gets one near-equal block; with one,
///   fixed-size chunks are dealt round-robin.
/// - `dynamic`: size of every claimed chunk (default [`Schedule::DEFAULT_DYNAMIC_CHUNK`]).
/// - `guided`: lower bound on the shrinking chunk size (default 1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schedule {
    pub policy: SchedulePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

impl Schedule {
    pub const DEFAULT_DYNAMIC_CHUNK: u64 = 1000;
    pub const DEFAULT_GUIDED_MIN_CHUNK: u64 = 1;

    pub const fn new(policy: SchedulePolicy) -> Self {
        Self {
            policy,
            chunk_size: None,
        }
    }

    pub const fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Parse a label, falling back to the default `static` schedule when the label is
    /// not recognised.
    pub fn parse_lenient(label: &str) -> Self {
        match label.parse() {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!("{e}; falling back to static scheduling");
                Schedule::default()
            }
        }
    }

    /// Replace a `runtime` policy with whatever the source provides.
    ///
    /// A source that yields nothing, or yields `runtime` again, resolves to `static`.
    /// A chunk size given here is kept when the source does not specify one.
    pub fn resolve(&self, source: &dyn ScheduleSource) -> Schedule {
        if self.policy != SchedulePolicy::Runtime {
            return *self;
        }

        let resolved = match source.runtime_schedule() {
            Some(found) if found.policy != SchedulePolicy::Runtime => Schedule {
                policy: found.policy,
                chunk_size: found.chunk_size.or(self.chunk_size),
            },
            _ => Schedule {
                policy: SchedulePolicy::Static,
                chunk_size: self.chunk_size,
            },
        };
        tracing::debug!("runtime schedule resolved to {resolved}");
        resolved
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk_size {
            Some(chunk) => write!(f, "{},{}", self.policy, chunk),
            None => write!(f, "{}", self.policy),
        }
    }
}

impl FromStr for Schedule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, chunk) = match s.split_once(',') {
            Some((kind, chunk)) => (kind, Some(chunk.trim())),
            None => (s, None),
        };
        let policy: SchedulePolicy = kind.parse()?;

        let chunk_size = match chunk {
            None | Some("") => None,
            Some(raw) => {
                let size: u64 = raw
                    .parse()
                    .map_err(|_| anyhow!("invalid chunk size '{raw}' in schedule '{s}'"))?;
                if size == 0 {
                    bail!("chunk size must be positive in schedule '{s}'");
                }
                Some(size)
            }
        };

        Ok(Schedule { policy, chunk_size })
    }
}

impl From<SchedulePolicy> for Schedule {
    fn from(policy: SchedulePolicy) -> Self {
        Schedule::new(policy)
    }
}

/// Where a `runtime` schedule comes from
pub trait ScheduleSource {
    fn runtime_schedule(&self) -> Option<Schedule>;
}

/// A fixed answer; `None` means "unset"
impl ScheduleSource for Option<Schedule> {
    fn runtime_schedule(&self) -> Option<Schedule> {
        *self
    }
}

/// Reads the runtime schedule from an environment variable each time it is asked.
#[derive(Debug, Clone)]
pub struct EnvScheduleSource {
    var: String,
}

impl EnvScheduleSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvScheduleSource {
    fn default() -> Self {
        Self::new(RUNTIME_SCHEDULE_ENV)
    }
}

impl ScheduleSource for EnvScheduleSource {
    fn runtime_schedule(&self) -> Option<Schedule> {
        let raw = std::env::var(&self.var).ok()?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(Schedule::parse_lenient(&raw))
    }
}
