//! Process configuration.
//!
//! Every setting is a command-line flag backed by an environment variable, so
//! the service runs with no arguments in a container and can still be poked
//! from a shell. Boolean variables accept `true/false`, `1/0`, `yes/no` and
//! `on/off`.

use crate::resources::producer::EventStreamSettings;
use crate::resources::store::StoreSettings;
use crate::retry::RetryPolicy;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "user-service")]
#[command(version, about = "User record service", long_about = None)]
pub struct ServiceConfig {
    /// HTTP listen port
    #[arg(long, env = "SERVICE_PORT", default_value_t = 8082)]
    pub port: u16,

    /// Development mode; `false` turns on TLS for the store and the event stream
    #[arg(
        long,
        env = "DEV_MODE",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub dev_mode: bool,

    /// Deadline for one inbound request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Time allowed for all resources to connect and pass their health probes
    #[arg(long, env = "STARTUP_TIMEOUT_SECS", default_value_t = 30)]
    pub startup_timeout_secs: u64,

    /// Time allowed for draining requests and closing resources
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// User ids are drawn uniformly from `[0, USER_ID_SPACE)`
    #[arg(long, env = "USER_ID_SPACE", default_value_t = 10_000, value_parser = clap::value_parser!(u32).range(1..))]
    pub user_id_space: u32,

    /// Draws before giving up when every drawn id is taken
    #[arg(long, env = "ID_ALLOCATION_ATTEMPTS", default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub id_allocation_attempts: u32,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub store: StoreConfig,

    #[command(flatten)]
    pub events: EventConfig,

    #[command(flatten)]
    pub orders: OrderServiceConfig,

    #[command(flatten)]
    pub otel: OtelConfig,
}

#[derive(Clone, Args)]
pub struct StoreConfig {
    #[arg(long = "store-database", env = "STORE_DATABASE", default_value = "demo")]
    pub database: String,

    #[arg(long = "store-collection", env = "STORE_COLLECTION", default_value = "users")]
    pub collection: String,

    #[arg(long = "store-username", env = "STORE_USERNAME", default_value = "root")]
    pub username: String,

    #[arg(long = "store-password", env = "STORE_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// CA certificate, required when DEV_MODE is off
    #[arg(long = "store-ca-cert", env = "STORE_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Client certificate and key bundle, required when DEV_MODE is off
    #[arg(long = "store-client-cert-key", env = "STORE_CLIENT_CERT_KEY")]
    pub client_cert_key: Option<PathBuf>,

    #[arg(id = "store_timeout_secs", long = "store-timeout-secs", env = "STORE_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_cert", &self.ca_cert)
            .field("client_cert_key", &self.client_cert_key)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Args)]
pub struct EventConfig {
    /// Comma separated `host:port` list
    #[arg(long = "event-brokers", env = "EVENT_BROKERS", default_value = "localhost:9092", value_delimiter = ',')]
    pub brokers: Vec<String>,

    #[arg(long = "event-topic", env = "EVENT_TOPIC", default_value = "demoTopic")]
    pub topic: String,

    #[arg(long = "event-partitions", env = "EVENT_PARTITIONS", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub partitions: u32,

    #[arg(long = "event-client-cert", env = "EVENT_CLIENT_CERT")]
    pub client_cert: Option<PathBuf>,

    #[arg(long = "event-client-key", env = "EVENT_CLIENT_KEY")]
    pub client_key: Option<PathBuf>,

    #[arg(long = "event-max-attempts", env = "EVENT_MAX_ATTEMPTS", default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    #[arg(long = "event-attempt-timeout-secs", env = "EVENT_ATTEMPT_TIMEOUT_SECS", default_value_t = 10)]
    pub attempt_timeout_secs: u64,

    #[arg(long = "event-backoff-ms", env = "EVENT_BACKOFF_MS", default_value_t = 250)]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Args)]
pub struct OrderServiceConfig {
    #[arg(long = "order-svc-host", env = "ORDER_SVC_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(id = "order_svc_port", long = "order-svc-port", env = "ORDER_SVC_PORT", default_value_t = 8081)]
    pub port: u16,

    #[arg(id = "order_svc_timeout_secs", long = "order-svc-timeout-secs", env = "ORDER_SVC_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Args)]
pub struct OtelConfig {
    /// Export spans over OTLP/gRPC
    #[arg(
        long = "otel-enable",
        env = "OTEL_ENABLE",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub enabled: bool,

    #[arg(long = "otel-collector-url", env = "OTEL_COLLECTOR_URL", default_value = "http://localhost:4317")]
    pub collector_url: String,

    #[arg(long = "otel-service-name", env = "OTEL_SERVICE_NAME", default_value = "user-service")]
    pub service_name: String,
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Retry policy shared by audit emission and the producer warm-up.
    pub fn event_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.events.max_attempts,
            per_attempt_timeout: Duration::from_secs(self.events.attempt_timeout_secs),
            backoff: Duration::from_millis(self.events.backoff_ms),
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            database: self.store.database.clone(),
            collection: self.store.collection.clone(),
            username: self.store.username.clone(),
            password: self.store.password.clone(),
            secured: !self.dev_mode,
            ca_cert: self.store.ca_cert.clone(),
            client_cert_key: self.store.client_cert_key.clone(),
            operation_timeout: Duration::from_secs(self.store.timeout_secs),
            ..StoreSettings::embedded()
        }
    }

    pub fn event_settings(&self) -> EventStreamSettings {
        EventStreamSettings {
            brokers: self
                .events
                .brokers
                .iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect(),
            topic: self.events.topic.clone(),
            partitions: self.events.partitions,
            secured: !self.dev_mode,
            client_cert: self.events.client_cert.clone(),
            client_key: self.events.client_key.clone(),
            write_timeout: Duration::from_secs(self.events.attempt_timeout_secs),
            warmup: self.event_retry_policy(),
            ..EventStreamSettings::embedded()
        }
    }

    /// `http://<host>:<port>` of the order service.
    pub fn order_service_url(&self) -> String {
        format!("http://{}:{}", self.orders.host, self.orders.port)
    }

    pub fn order_service_timeout(&self) -> Duration {
        Duration::from_secs(self.orders.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServiceConfig {
        let argv = std::iter::once("user-service").chain(args.iter().copied());
        ServiceConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_and_derive_settings() {
        let config = parse(&[
            "--port",
            "9000",
            "--dev-mode",
            "no",
            "--event-brokers",
            "b1:9092, b2:9093",
            "--order-svc-host",
            "orders",
            "--event-backoff-ms",
            "10",
            "--log-format",
            "json",
        ]);

        assert_eq!(config.port, 9000);
        assert!(!config.dev_mode);
        assert!(config.store_settings().secured);
        assert_eq!(config.event_settings().brokers, vec!["b1:9092", "b2:9093"]);
        assert_eq!(config.order_service_url(), "http://orders:8081");
        assert_eq!(config.event_retry_policy().backoff, Duration::from_millis(10));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_command_definition_is_consistent() {
        use clap::CommandFactory;
        ServiceConfig::command().debug_assert();
    }

    #[test]
    fn test_same_named_settings_stay_separate() {
        let config = parse(&[
            "--port",
            "9000",
            "--order-svc-port",
            "9100",
            "--store-timeout-secs",
            "7",
            "--order-svc-timeout-secs",
            "3",
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.orders.port, 9100);
        assert_eq!(config.order_service_url(), "http://localhost:9100");
        assert_eq!(config.store_settings().operation_timeout, Duration::from_secs(7));
        assert_eq!(config.order_service_timeout(), Duration::from_secs(3));

        let defaults = parse(&[]);
        assert_eq!(defaults.port, 8082);
        assert_eq!(defaults.orders.port, 8081);
        assert_eq!(defaults.store.timeout_secs, 30);
        assert_eq!(defaults.orders.timeout_secs, 10);
    }

    #[test]
    fn test_zero_id_space_is_rejected() {
        let result = ServiceConfig::try_parse_from(["user-service", "--user-id-space", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_store_config_debug_redacts_password() {
        let config = parse(&["--store-password", "s3cret"]);
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
