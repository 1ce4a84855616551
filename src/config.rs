//! Runtime and logging configuration

use std::env;

use log::LevelFilter;

use crate::signal::types::{DefaultBehavior, SigNum};

/// Whether a runtime owns the process's OS signal dispositions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attach {
    /// Install `sigaction` dispositions; only the global runtime can be attached
    #[default]
    Host,
    /// Keep everything in process; signals arrive only through `deliver`
    Detached,
}

/// Settings for a [`SignalRuntime`](crate::runtime::SignalRuntime)
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    attach: Attach,
    defaults: Vec<(SigNum, DefaultBehavior)>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detached() -> Self {
        Self::new().attach(Attach::Detached)
    }

    pub fn attach(mut self, attach: Attach) -> Self {
        self.attach = attach;
        self
    }

    /// Register what the `DEFAULT` action does for `sig`
    pub fn default_behavior(mut self, sig: SigNum, behavior: DefaultBehavior) -> Self {
        self.defaults.retain(|(s, _)| *s != sig);
        self.defaults.push((sig, behavior));
        self
    }

    pub fn attach_mode(&self) -> Attach {
        self.attach
    }

    pub fn default_overrides(&self) -> &[(SigNum, DefaultBehavior)] {
        &self.defaults
    }
}

/// Logger settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: LevelFilter::Warn,
        }
    }
}

impl LogConfig {
    /// Environment variable holding the log level
    pub const ENV_VAR: &'static str = "SIGTRAP_LOG";

    /// Read the level from `SIGTRAP_LOG`, falling back to `warn`
    pub fn from_env() -> Self {
        Self::from_value(env::var(Self::ENV_VAR).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => match v.parse::<LevelFilter>() {
                Ok(level) => LogConfig { level },
                Err(_) => {
                    eprintln!("{}: unknown log level '{}', using warn", Self::ENV_VAR, v);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }
}
