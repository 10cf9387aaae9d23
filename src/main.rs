// author: kodeholic (powered by Claude)

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mini_rtcsession::{config, run_relay, RelayArgs};

/// lcrelay: 룸 코드 기반 시그널링 릴레이
#[derive(Parser)]
#[command(name = "lcrelay", about = "mini-rtcsession signaling relay", version)]
struct Cli {
    /// WS/HTTP 공용 포트
    #[arg(long, env = "RTC_RELAY_PORT", default_value_t = config::RELAY_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() {
    // RUST_LOG 우선, 없으면 info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_relay(RelayArgs { port: cli.port }).await {
        error!("[mini-rtcsession] relay stopped: {}", e);
        std::process::exit(1);
    }
}
