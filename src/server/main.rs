use clap::Parser;
use konnekt_relay::config::RelayConfig;
use konnekt_relay::model::JoinPolicy;
use konnekt_relay::server::telemetry::{init_telemetry, shutdown_telemetry};
use konnekt_relay::server::RelayServer;
use std::net::SocketAddr;
use std::process::ExitCode;

/// Command-line overrides. Anything not given here comes from the
/// environment (see `RelayConfig::from_env`), then from the defaults.
#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(version, about = "Signaling relay for peer-to-peer audio calls")]
struct Cli {
    /// Address to listen on [env: RELAY_BIND_ADDRESS, default: 0.0.0.0:8000]
    #[arg(short = 'b', long)]
    bind: Option<SocketAddr>,

    /// What to do when a participant joins a second room (reject|transfer) [env: RELAY_JOIN_POLICY]
    #[arg(long)]
    join_policy: Option<JoinPolicy>,

    /// Tell remaining room members when a participant leaves [env: RELAY_NOTIFY_PEER_LEFT]
    #[arg(long)]
    notify_peer_left: bool,

    /// Tell a sender when its target is no longer connected [env: RELAY_NOTIFY_UNREACHABLE]
    #[arg(long)]
    notify_unreachable: bool,

    /// Outbound queue size per connection [env: RELAY_CHANNEL_CAPACITY, default: 32]
    #[arg(long)]
    channel_capacity: Option<usize>,

    /// Export traces to Jaeger [env: ENABLE_TELEMETRY]
    #[arg(long)]
    enable_telemetry: bool,

    /// Jaeger collector endpoint [env: JAEGER_ENDPOINT]
    #[arg(long)]
    jaeger_endpoint: Option<String>,
}

impl Cli {
    /// Layer the flags that were given on top of `config`.
    fn apply(self, mut config: RelayConfig) -> RelayConfig {
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(join_policy) = self.join_policy {
            config = config.with_join_policy(join_policy);
        }
        if self.notify_peer_left {
            config = config.with_peer_left_notification(true);
        }
        if self.notify_unreachable {
            config = config.with_unreachable_notification(true);
        }
        if let Some(capacity) = self.channel_capacity {
            config = config.with_channel_capacity(capacity);
        }
        if self.enable_telemetry {
            config.enable_telemetry = true;
        }
        if let Some(endpoint) = self.jaeger_endpoint {
            config.jaeger_endpoint = endpoint;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().apply(RelayConfig::from_env());

    if let Err(e) = init_telemetry(&config) {
        eprintln!("Failed to initialize telemetry: {e}");
        return ExitCode::FAILURE;
    }

    let result = RelayServer::new(config.clone()).run().await;
    shutdown_telemetry(&config);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Relay server failed");
            ExitCode::FAILURE
        }
    }
}
