//! System configuration with sensible defaults.

// Layer 1: Standard library
use std::time::Duration;

// Layer 2: Third-party
use serde::{Deserialize, Serialize};

// Layer 3: Internal
use crate::monitoring::EventSeverity;
use crate::supervisor::RestartPolicy;

/// Default mailbox capacity for bounded mailboxes
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Default timeout for actor spawn operations (5 seconds)
pub const DEFAULT_SPAWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for graceful system shutdown (30 seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum concurrent actors (0 = unlimited)
pub const DEFAULT_MAX_ACTORS: usize = 0;

/// Default metrics collection setting (disabled following YAGNI ยง6.1)
pub const DEFAULT_ENABLE_METRICS: bool = false;

/// Default number of dispatcher worker threads (0 = use tokio's default).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Default dispatcher throughput: messages processed per actor per scheduling turn.
pub const DEFAULT_THROUGHPUT: usize = 100;

/// Default `ask` timeout when the caller does not specify one.
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default idle duration before a sharded entity is eligible for passivation.
pub const DEFAULT_SHARDING_PASSIVATION_IDLE: Duration = Duration::from_secs(120);

/// Default buffer size for messages queued to a shard while it is starting up.
pub const DEFAULT_SHARDING_BUFFER_SIZE: usize = 1000;

/// Default number of virtual nodes per real routee in consistent-hash routing.
pub const DEFAULT_ROUTER_CONSISTENT_HASH_VIRTUAL_NODES: usize = 128;

/// Default: whether a topic with zero subscribers stops itself.
pub const DEFAULT_TOPIC_STOP_WHEN_EMPTY: bool = true;

/// System-wide configuration for actor runtime.
///
/// Provides sensible defaults following ยง6.1 YAGNI principles.
///
/// # Examples
///
/// ```rust
/// use airssys_rt::system::{SystemConfig, DEFAULT_MAILBOX_CAPACITY};
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = SystemConfig::default();
/// assert_eq!(config.default_mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
///
/// // Use builder for custom configuration
/// let config = SystemConfig::builder()
///     .with_mailbox_capacity(500)
///     .with_spawn_timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.default_mailbox_capacity, 500);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Default mailbox capacity for bounded mailboxes
    pub default_mailbox_capacity: usize,

    /// Timeout for actor spawn operations
    pub spawn_timeout: Duration,

    /// Timeout for graceful system shutdown
    pub shutdown_timeout: Duration,

    /// Maximum concurrent actors (0 = unlimited)
    pub max_actors: usize,

    /// Enable system metrics collection (disabled by default - YAGNI)
    pub enable_metrics: bool,

    /// Dispatcher worker threads (0 = inherit tokio's own default).
    pub worker_threads: usize,

    /// Default dispatcher throughput (messages per actor per scheduling turn).
    pub default_throughput: usize,

    /// Default mailbox capacity used by receptionist/router/topic/sharding
    /// cells that don't override it explicitly.
    pub mailbox_capacity: usize,

    /// Default timeout for `ask` requests that don't specify one.
    pub ask_default_timeout: Duration,

    /// Default supervision restart policy for actors spawned without an
    /// explicit `ChildSpec`.
    pub default_supervision: RestartPolicy,

    /// Minimum severity at which dead letters are also surfaced as log-like
    /// monitoring events (dead letters below this are still counted, only
    /// not escalated to the monitor at `Warning`+).
    pub dead_letter_log_level: EventSeverity,

    /// How long a sharded entity may sit idle before it's eligible for
    /// passivation.
    pub sharding_passivation_idle: Duration,

    /// Buffer size for messages queued to a shard while its entity starts.
    pub sharding_buffer_size: usize,

    /// Virtual nodes per routee for `ConsistentHash` routing.
    pub router_consistent_hash_virtual_nodes: usize,

    /// Whether a topic with no subscribers left stops itself.
    pub topic_stop_when_empty: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            spawn_timeout: DEFAULT_SPAWN_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_actors: DEFAULT_MAX_ACTORS,
            enable_metrics: DEFAULT_ENABLE_METRICS,
            worker_threads: DEFAULT_WORKER_THREADS,
            default_throughput: DEFAULT_THROUGHPUT,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            ask_default_timeout: DEFAULT_ASK_TIMEOUT,
            default_supervision: RestartPolicy::Permanent,
            dead_letter_log_level: EventSeverity::Warning,
            sharding_passivation_idle: DEFAULT_SHARDING_PASSIVATION_IDLE,
            sharding_buffer_size: DEFAULT_SHARDING_BUFFER_SIZE,
            router_consistent_hash_virtual_nodes: DEFAULT_ROUTER_CONSISTENT_HASH_VIRTUAL_NODES,
            topic_stop_when_empty: DEFAULT_TOPIC_STOP_WHEN_EMPTY,
        }
    }
}

impl SystemConfig {
    /// Create a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    /// use std::time::Duration;
    ///
    /// let config = SystemConfig::builder()
    ///     .with_mailbox_capacity(500)
    ///     .with_max_actors(100)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    ///
    /// Returns `Err` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_mailbox_capacity == 0 {
            return Err("default_mailbox_capacity must be > 0".to_string());
        }

        if self.spawn_timeout.as_secs() == 0 && self.spawn_timeout.as_millis() == 0 {
            return Err("spawn_timeout must be > 0".to_string());
        }

        if self.shutdown_timeout.as_secs() == 0 && self.shutdown_timeout.as_millis() == 0 {
            return Err("shutdown_timeout must be > 0".to_string());
        }

        if self.default_throughput == 0 {
            return Err("default_throughput must be > 0".to_string());
        }

        if self.mailbox_capacity == 0 {
            return Err("mailbox_capacity must be > 0".to_string());
        }

        if self.ask_default_timeout.is_zero() {
            return Err("ask_default_timeout must be > 0".to_string());
        }

        if self.sharding_buffer_size == 0 {
            return Err("sharding_buffer_size must be > 0".to_string());
        }

        if self.router_consistent_hash_virtual_nodes == 0 {
            return Err("router_consistent_hash_virtual_nodes must be > 0".to_string());
        }

        Ok(())
    }
}

/// Builder for SystemConfig with fluent API.
///
/// Follows Builder Pattern for ergonomic configuration.
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Set default mailbox capacity for bounded mailboxes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    ///
    /// let config = SystemConfig::builder()
    ///     .with_mailbox_capacity(500)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.default_mailbox_capacity, 500);
    /// ```
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.default_mailbox_capacity = capacity;
        self
    }

    /// Set timeout for actor spawn operations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    /// use std::time::Duration;
    ///
    /// let config = SystemConfig::builder()
    ///     .with_spawn_timeout(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.spawn_timeout, Duration::from_secs(10));
    /// ```
    pub fn with_spawn_timeout(mut self, timeout: Duration) -> Self {
        self.config.spawn_timeout = timeout;
        self
    }

    /// Set timeout for graceful system shutdown.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    /// use std::time::Duration;
    ///
    /// let config = SystemConfig::builder()
    ///     .with_shutdown_timeout(Duration::from_secs(60))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.shutdown_timeout, Duration::from_secs(60));
    /// ```
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Set maximum number of concurrent actors (0 = unlimited).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    ///
    /// let config = SystemConfig::builder()
    ///     .with_max_actors(100)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_actors, 100);
    /// ```
    pub fn with_max_actors(mut self, max: usize) -> Self {
        self.config.max_actors = max;
        self
    }

    /// Enable or disable system metrics collection.
    ///
    /// Disabled by default following YAGNI principle.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    ///
    /// let config = SystemConfig::builder()
    ///     .with_metrics(true)
    ///     .build()
    ///     .unwrap();
    /// assert!(config.enable_metrics);
    /// ```
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.config.enable_metrics = enabled;
        self
    }

    /// Set the number of dispatcher worker threads (0 = tokio default).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    /// Set the dispatcher throughput (messages per actor per scheduling turn).
    pub fn with_default_throughput(mut self, throughput: usize) -> Self {
        self.config.default_throughput = throughput;
        self
    }

    /// Set the default `ask` timeout.
    pub fn with_ask_default_timeout(mut self, timeout: Duration) -> Self {
        self.config.ask_default_timeout = timeout;
        self
    }

    /// Set the default supervision restart policy.
    pub fn with_default_supervision(mut self, policy: RestartPolicy) -> Self {
        self.config.default_supervision = policy;
        self
    }

    /// Set the minimum severity at which dead letters are escalated to the monitor.
    pub fn with_dead_letter_log_level(mut self, level: EventSeverity) -> Self {
        self.config.dead_letter_log_level = level;
        self
    }

    /// Set the sharded-entity passivation idle duration.
    pub fn with_sharding_passivation_idle(mut self, idle: Duration) -> Self {
        self.config.sharding_passivation_idle = idle;
        self
    }

    /// Set the buffer size for messages queued to a starting shard.
    pub fn with_sharding_buffer_size(mut self, size: usize) -> Self {
        self.config.sharding_buffer_size = size;
        self
    }

    /// Set the virtual-node count used by `ConsistentHash` routing.
    pub fn with_router_consistent_hash_virtual_nodes(mut self, nodes: usize) -> Self {
        self.config.router_consistent_hash_virtual_nodes = nodes;
        self
    }

    /// Set whether an empty topic stops itself.
    pub fn with_topic_stop_when_empty(mut self, stop: bool) -> Self {
        self.config.topic_stop_when_empty = stop;
        self
    }

    /// Build and validate the configuration.
    ///
    /// Returns `Err` if configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use airssys_rt::system::SystemConfig;
    ///
    /// // Valid configuration
    /// let config = SystemConfig::builder()
    ///     .with_mailbox_capacity(500)
    ///     .build();
    /// assert!(config.is_ok());
    ///
    /// // Invalid configuration
    /// let invalid = SystemConfig::builder()
    ///     .with_mailbox_capacity(0)
    ///     .build();
    /// assert!(invalid.is_err());
    /// ```
    pub fn build(self) -> Result<SystemConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SystemConfig::default();
        assert_eq!(config.default_mailbox_capacity, 1000);
        assert_eq!(config.spawn_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.max_actors, 0);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_config_validation_success() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_capacity() {
        let invalid = SystemConfig {
            default_mailbox_capacity: 0,
            ..Default::default()
        };
        let result = invalid.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("mailbox_capacity"));
    }

    #[test]
    fn test_config_validation_zero_spawn_timeout() {
        let invalid = SystemConfig {
            spawn_timeout: Duration::from_secs(0),
            ..Default::default()
        };
        let result = invalid.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("spawn_timeout"));
    }

    #[test]
    fn test_config_validation_zero_shutdown_timeout() {
        let invalid = SystemConfig {
            shutdown_timeout: Duration::from_secs(0),
            ..Default::default()
        };
        let result = invalid.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("shutdown_timeout"));
    }

    #[test]
    fn test_builder_default() {
        let config = SystemConfig::builder().build().unwrap();
        assert_eq!(config.default_mailbox_capacity, 1000);
    }

    #[test]
    fn test_builder_with_capacity() {
        let config = SystemConfig::builder()
            .with_mailbox_capacity(500)
            .build()
            .unwrap();
        assert_eq!(config.default_mailbox_capacity, 500);
    }

    #[test]
    fn test_builder_with_spawn_timeout() {
        let config = SystemConfig::builder()
            .with_spawn_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(config.spawn_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_with_shutdown_timeout() {
        let config = SystemConfig::builder()
            .with_shutdown_timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_with_max_actors() {
        let config = SystemConfig::builder()
            .with_max_actors(100)
            .build()
            .unwrap();
        assert_eq!(config.max_actors, 100);
    }

    #[test]
    fn test_builder_with_metrics() {
        let config = SystemConfig::builder().with_metrics(true).build().unwrap();
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_builder_multiple_options() {
        let config = SystemConfig::builder()
            .with_mailbox_capacity(500)
            .with_spawn_timeout(Duration::from_secs(10))
            .with_shutdown_timeout(Duration::from_secs(60))
            .with_max_actors(100)
            .with_metrics(true)
            .build()
            .unwrap();

        assert_eq!(config.default_mailbox_capacity, 500);
        assert_eq!(config.spawn_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(60));
        assert_eq!(config.max_actors, 100);
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_builder_validation_failure() {
        let result = SystemConfig::builder().with_mailbox_capacity(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_json() {
        let config = SystemConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SystemConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            config.default_mailbox_capacity,
            deserialized.default_mailbox_capacity
        );
        assert_eq!(config.max_actors, deserialized.max_actors);
        assert_eq!(config.enable_metrics, deserialized.enable_metrics);
    }

    #[test]
    fn test_config_clone() {
        let config1 = SystemConfig::default();
        let config2 = config1.clone();

        assert_eq!(
            config1.default_mailbox_capacity,
            config2.default_mailbox_capacity
        );
    }

    #[test]
    fn test_config_debug() {
        let config = SystemConfig::default();
        let debug = format!("{:?}", config);
        assert!(debug.contains("SystemConfig"));
    }

    #[test]
    fn test_default_ambient_fields() {
        let config = SystemConfig::default();
        assert_eq!(config.default_throughput, DEFAULT_THROUGHPUT);
        assert_eq!(config.ask_default_timeout, DEFAULT_ASK_TIMEOUT);
        assert_eq!(config.default_supervision, RestartPolicy::Permanent);
        assert_eq!(config.dead_letter_log_level, EventSeverity::Warning);
        assert!(config.topic_stop_when_empty);
    }

    #[test]
    fn test_builder_ambient_fields() {
        let config = SystemConfig::builder()
            .with_default_throughput(50)
            .with_ask_default_timeout(Duration::from_secs(1))
            .with_default_supervision(RestartPolicy::Transient)
            .with_sharding_buffer_size(10)
            .with_router_consistent_hash_virtual_nodes(64)
            .with_topic_stop_when_empty(false)
            .build()
            .unwrap();

        assert_eq!(config.default_throughput, 50);
        assert_eq!(config.ask_default_timeout, Duration::from_secs(1));
        assert_eq!(config.default_supervision, RestartPolicy::Transient);
        assert_eq!(config.sharding_buffer_size, 10);
        assert_eq!(config.router_consistent_hash_virtual_nodes, 64);
        assert!(!config.topic_stop_when_empty);
    }

    #[test]
    fn test_config_validation_zero_throughput() {
        let invalid = SystemConfig {
            default_throughput: 0,
            ..Default::default()
        };
        assert!(invalid.validate().unwrap_err().contains("throughput"));
    }
}
