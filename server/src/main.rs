use clap::Parser;
use env_logger::Env;
use log::info;
use server::config::ServerConfig;
use server::ecs::{AiComponent, EntityDesc, EntityKind, StatsComponent};
use server::game::GameState;
use server::network::Server;
use server::repository::MemoryRepository;
use shared::{Vec3, DEFAULT_PORT, TIMEOUT_DURATION_MS};
use std::path::PathBuf;
use std::time::Duration;

const DUMMY_POSITION: Vec3 = Vec3::new(30.0, 0.0, 30.0);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Milliseconds without a heartbeat before a session is logged out
    #[arg(long, default_value_t = TIMEOUT_DURATION_MS)]
    timeout_ms: u64,

    /// Maximum number of live entities
    #[arg(long, default_value = "100000")]
    max_entities: usize,

    /// Maximum datagrams handled per tick
    #[arg(long, default_value = "512")]
    recv_budget: usize,

    /// Account store; kept in memory only when omitted
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        session_timeout: Duration::from_millis(args.timeout_ms),
        max_entities: args.max_entities,
        recv_budget: args.recv_budget,
        ..ServerConfig::default()
    }
    .with_tick_rate(args.tick_rate);

    let repository = match &args.db {
        Some(path) => MemoryRepository::open(path)?,
        None => MemoryRepository::new(),
    };

    let mut game_state = GameState::new(&config, Box::new(repository))?;
    let dummy = game_state.spawn_npc(
        EntityDesc::new(EntityKind::Npc, "Training Dummy", DUMMY_POSITION),
        StatsComponent::default(),
        AiComponent::stationary(DUMMY_POSITION),
    )?;
    info!("Training dummy is entity {}", dummy);

    let mut server = Server::bind(&config, game_state).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await?;

    Ok(())
}
