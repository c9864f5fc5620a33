//! Carrier configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. User's strand_config.rs named by `STRAND_CONFIG_RS` (build time)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_context::config::CarrierConfig;
//!
//! let config = CarrierConfig::from_env()
//!     .stack_size(256 * 1024)
//!     .preserve_fpu(false);
//! ```

pub mod defaults;

use std::time::Duration;

use strand_core::constants::{MAX_CARRIERS, MAX_CONTEXTS, MIN_STACK_SIZE};
use strand_core::{env_get, env_get_bool, env_get_size, ConfigError};

/// Configuration for carriers and carrier pools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierConfig {
    /// Stack size of every task
    pub stack_size: usize,
    /// Live tasks per carrier
    pub max_contexts: usize,
    /// Carry FPU control/status words across switches
    pub preserve_fpu: bool,
    /// Finished-task stacks kept for reuse
    pub stack_pool_limit: usize,
    /// Carrier threads in a pool
    pub num_carriers: usize,
    /// Per-carrier submission queue capacity
    pub injector_capacity: usize,
    /// How long an idle pool carrier parks before re-checking
    pub park_timeout: Duration,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CarrierConfig {
    /// Compile-time defaults with environment overrides
    ///
    /// Environment variables (all optional):
    /// - `STRAND_STACK_SIZE` - Stack size, accepts k/m/g suffixes
    /// - `STRAND_MAX_CONTEXTS` - Live tasks per carrier
    /// - `STRAND_PRESERVE_FPU` - Save FPU control words (0/1, true/false)
    /// - `STRAND_STACK_POOL_LIMIT` - Stacks cached for reuse
    /// - `STRAND_NUM_CARRIERS` - Carrier threads in a pool
    /// - `STRAND_INJECTOR_CAPACITY` - Per-carrier submission queue size
    /// - `STRAND_PARK_TIMEOUT_MS` - Idle park timeout in milliseconds
    pub fn from_env() -> Self {
        Self {
            stack_size: env_get_size("STRAND_STACK_SIZE", defaults::STACK_SIZE),
            max_contexts: env_get("STRAND_MAX_CONTEXTS", defaults::MAX_CONTEXTS),
            preserve_fpu: env_get_bool("STRAND_PRESERVE_FPU", defaults::PRESERVE_FPU),
            stack_pool_limit: env_get("STRAND_STACK_POOL_LIMIT", defaults::STACK_POOL_LIMIT),
            num_carriers: env_get("STRAND_NUM_CARRIERS", defaults::NUM_CARRIERS),
            injector_capacity: env_get("STRAND_INJECTOR_CAPACITY", defaults::INJECTOR_CAPACITY),
            park_timeout: Duration::from_millis(env_get(
                "STRAND_PARK_TIMEOUT_MS",
                defaults::PARK_TIMEOUT_MS,
            )),
        }
    }

    /// Compile-time defaults only, ignoring the environment
    pub fn new() -> Self {
        Self {
            stack_size: defaults::STACK_SIZE,
            max_contexts: defaults::MAX_CONTEXTS,
            preserve_fpu: defaults::PRESERVE_FPU,
            stack_pool_limit: defaults::STACK_POOL_LIMIT,
            num_carriers: defaults::NUM_CARRIERS,
            injector_capacity: defaults::INJECTOR_CAPACITY,
            park_timeout: Duration::from_millis(defaults::PARK_TIMEOUT_MS),
        }
    }

    // Builder methods

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn max_contexts(mut self, n: usize) -> Self {
        self.max_contexts = n;
        self
    }

    pub fn preserve_fpu(mut self, preserve: bool) -> Self {
        self.preserve_fpu = preserve;
        self
    }

    pub fn stack_pool_limit(mut self, n: usize) -> Self {
        self.stack_pool_limit = n;
        self
    }

    pub fn num_carriers(mut self, n: usize) -> Self {
        self.num_carriers = n;
        self
    }

    pub fn injector_capacity(mut self, cap: usize) -> Self {
        self.injector_capacity = cap;
        self
    }

    pub fn park_timeout(mut self, d: Duration) -> Self {
        self.park_timeout = d;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.max_contexts == 0 {
            return Err(ConfigError::InvalidValue("max_contexts must be > 0"));
        }
        if self.max_contexts > MAX_CONTEXTS {
            return Err(ConfigError::InvalidValue("max_contexts exceeds task id space"));
        }
        if self.num_carriers == 0 {
            return Err(ConfigError::InvalidValue("num_carriers must be > 0"));
        }
        if self.num_carriers > MAX_CARRIERS {
            return Err(ConfigError::InvalidValue("num_carriers must be <= 256"));
        }
        if self.injector_capacity == 0 {
            return Err(ConfigError::InvalidValue("injector_capacity must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("Strand Configuration:");
        eprintln!("  stack_size:         {}", self.stack_size);
        eprintln!("  max_contexts:       {}", self.max_contexts);
        eprintln!("  preserve_fpu:       {}", self.preserve_fpu);
        eprintln!("  stack_pool_limit:   {}", self.stack_pool_limit);
        eprintln!("  num_carriers:       {}", self.num_carriers);
        eprintln!("  injector_capacity:  {}", self.injector_capacity);
        eprintln!("  park_timeout:       {:?}", self.park_timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CarrierConfig::new();
        assert!(config.validate().is_ok());
        assert!(config.stack_size >= MIN_STACK_SIZE);
    }

    #[test]
    fn test_builder() {
        let config = CarrierConfig::new()
            .stack_size(128 * 1024)
            .max_contexts(8)
            .preserve_fpu(false)
            .park_timeout(Duration::from_millis(2));

        assert_eq!(config.stack_size, 128 * 1024);
        assert_eq!(config.max_contexts, 8);
        assert!(!config.preserve_fpu);
        assert_eq!(config.park_timeout, Duration::from_millis(2));
    }

    #[test]
    fn test_validation() {
        assert!(CarrierConfig::new().stack_size(4096).validate().is_err());
        assert!(CarrierConfig::new().max_contexts(0).validate().is_err());
        assert!(CarrierConfig::new().num_carriers(0).validate().is_err());
        assert!(CarrierConfig::new().num_carriers(1000).validate().is_err());
        assert!(CarrierConfig::new().injector_capacity(0).validate().is_err());
    }
}
