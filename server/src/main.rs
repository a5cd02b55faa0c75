//! Server entry point
//!
//! Loads the asset directory given on the command line, binds the UDP
//! transport and hands control to the tick engine. Startup failures (bad
//! assets, unbindable port) exit nonzero; a running server never exits on
//! its own.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use server::engine::Engine;
use server::error::ServerError;
use server::maps::MapRepository;
use server::network::UdpTransport;
use server::rng::WorldRng;
use shared::{MAX_PEERS, SERVER_PORT};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative tick-driven simulation server")]
struct Args {
    /// Directory holding map_global_data.json and the navmaps/ folder
    assets_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG environment variable not set. Set it to display logs!");
        eprintln!("Recommended: RUST_LOG=info server <assets_dir>");
    }

    let args = Args::parse();
    info!("Asset Directory: {}", args.assets_dir.display());

    if let Err(e) = serve(args).await {
        error!("Fatal: {e}");
        std::process::exit(1);
    }
}

async fn serve(args: Args) -> Result<(), ServerError> {
    let maps = Arc::new(MapRepository::load(&args.assets_dir)?);

    let bind_addr = format!("0.0.0.0:{SERVER_PORT}");
    let transport = UdpTransport::bind(&bind_addr, MAX_PEERS).await?;

    let mut engine = Engine::new(transport, maps, WorldRng::from_entropy())?;
    engine.run().await
}
