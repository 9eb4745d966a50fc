use crate::model::JoinPolicy;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;
pub const DEFAULT_JAEGER_ENDPOINT: &str = "http://jaeger:14268/api/traces";

/// Relay server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to
    pub bind_address: SocketAddr,

    /// Behaviour when joining a room while already in another one
    pub join_policy: JoinPolicy,

    /// Send `user:left` to remaining room members when a participant leaves
    pub notify_peer_left: bool,

    /// Send `target:unreachable` back to a sender whose target is gone
    pub notify_unreachable: bool,

    /// Outbound queue size per connection
    pub channel_capacity: usize,

    /// Export spans to Jaeger
    pub enable_telemetry: bool,

    pub jaeger_endpoint: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            join_policy: JoinPolicy::Reject,
            notify_peer_left: false,
            notify_unreachable: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            enable_telemetry: false,
            jaeger_endpoint: DEFAULT_JAEGER_ENDPOINT.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparsable values fall
    /// back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind_address: parse_or(&lookup, "RELAY_BIND_ADDRESS", defaults.bind_address),
            join_policy: parse_or(&lookup, "RELAY_JOIN_POLICY", defaults.join_policy),
            notify_peer_left: parse_or(&lookup, "RELAY_NOTIFY_PEER_LEFT", defaults.notify_peer_left),
            notify_unreachable: parse_or(
                &lookup,
                "RELAY_NOTIFY_UNREACHABLE",
                defaults.notify_unreachable,
            ),
            channel_capacity: parse_or(&lookup, "RELAY_CHANNEL_CAPACITY", defaults.channel_capacity)
                .max(1),
            enable_telemetry: parse_or(&lookup, "ENABLE_TELEMETRY", defaults.enable_telemetry),
            jaeger_endpoint: lookup("JAEGER_ENDPOINT").unwrap_or(defaults.jaeger_endpoint),
        }
    }

    pub fn with_join_policy(mut self, join_policy: JoinPolicy) -> Self {
        self.join_policy = join_policy;
        self
    }

    pub fn with_peer_left_notification(mut self, enabled: bool) -> Self {
        self.notify_peer_left = enabled;
        self
    }

    pub fn with_unreachable_notification(mut self, enabled: bool) -> Self {
        self.notify_unreachable = enabled;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_telemetry(mut self, jaeger_endpoint: String) -> Self {
        self.enable_telemetry = true;
        self.jaeger_endpoint = jaeger_endpoint;
        self
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(key, value = %raw, error = %e, "Invalid configuration value, using default");
            default
        }),
        None => default,
    }
}
