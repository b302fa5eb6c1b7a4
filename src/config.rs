/*!
 * Environment Configuration
 *
 * Settings for one environment, loadable from defaults, environment
 * variables or a JSON file.
 *
 * Environment variables:
 * - HANDLE_WRAP_WEAK_CALLBACK_POLICY: `skip` (default) or `invoke`
 * - HANDLE_WRAP_VERIFY_HANDLES: log leaked handles at teardown (default: false)
 * - HANDLE_WRAP_CLEANUP_MAX_ITERATIONS: loop turns spent on shutdown cleanup
 * - HANDLE_WRAP_REGISTRY_CAPACITY: preallocated registry slots
 */

use crate::core::errors::HandleError;
use crate::core::limits::{DEFAULT_CLEANUP_MAX_ITERATIONS, DEFAULT_REGISTRY_CAPACITY};
use crate::core::types::HandleResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Whether a close callback still runs once the collector has claimed the
/// wrapper's object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeakCallbackPolicy {
    /// Drop the stashed callback unrun
    #[default]
    Skip,
    /// Run the stashed callback anyway
    Invoke,
}

impl FromStr for WeakCallbackPolicy {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(WeakCallbackPolicy::Skip),
            "invoke" => Ok(WeakCallbackPolicy::Invoke),
            other => Err(HandleError::Config(format!(
                "unknown weak callback policy '{other}', expected 'skip' or 'invoke'"
            ))),
        }
    }
}

/// Configuration for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub weak_callback_policy: WeakCallbackPolicy,
    pub verify_handles_at_exit: bool,
    pub cleanup_max_iterations: usize,
    pub registry_capacity: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            weak_callback_policy: WeakCallbackPolicy::Skip,
            verify_handles_at_exit: false,
            cleanup_max_iterations: DEFAULT_CLEANUP_MAX_ITERATIONS,
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
        }
    }
}

impl EnvironmentConfig {
    #[inline]
    #[must_use]
    pub fn with_weak_callback_policy(mut self, policy: WeakCallbackPolicy) -> Self {
        self.weak_callback_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_verify_handles_at_exit(mut self, verify: bool) -> Self {
        self.verify_handles_at_exit = verify;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cleanup_max_iterations(mut self, iterations: usize) -> Self {
        self.cleanup_max_iterations = iterations;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    /// Defaults overridden by `HANDLE_WRAP_*` environment variables
    pub fn from_env() -> HandleResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> HandleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(policy) = lookup("HANDLE_WRAP_WEAK_CALLBACK_POLICY") {
            config.weak_callback_policy = policy.parse()?;
        }
        if let Some(verify) = lookup("HANDLE_WRAP_VERIFY_HANDLES") {
            config.verify_handles_at_exit = verify == "1" || verify.eq_ignore_ascii_case("true");
        }
        if let Some(iterations) = lookup("HANDLE_WRAP_CLEANUP_MAX_ITERATIONS") {
            config.cleanup_max_iterations = parse_usize("HANDLE_WRAP_CLEANUP_MAX_ITERATIONS", &iterations)?;
        }
        if let Some(capacity) = lookup("HANDLE_WRAP_REGISTRY_CAPACITY") {
            config.registry_capacity = parse_usize("HANDLE_WRAP_REGISTRY_CAPACITY", &capacity)?;
        }

        Ok(config)
    }

    pub fn from_json_str(json: &str) -> HandleResult<Self> {
        serde_json::from_str(json).map_err(|e| HandleError::Config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> HandleResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HandleError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }
}

fn parse_usize(key: &str, value: &str) -> HandleResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| HandleError::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}
