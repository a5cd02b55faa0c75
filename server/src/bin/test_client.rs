//! Minimal command-line test client
//!
//! Connects to a running tick server, reports circular movement for its
//! player object for a few seconds, fires one melee attack halfway through,
//! and prints every lifecycle message and a sample of the snapshots it
//! receives. Useful for eyeballing a live server without a real game
//! client:
//!
//! ```bash
//! cargo run --bin test_client -- 127.0.0.1:7777
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

use shared::protocol::{decode, encode, Packet};
use shared::{AttackType, ObjectData, ProjectileType, Vec3};

/// Leading byte of every datagram: 0 reliable, 1 unreliable, 2 goodbye
const CHANNEL_RELIABLE: u8 = 0;
const CHANNEL_UNRELIABLE: u8 = 1;
const DISCONNECT_TAG: u8 = 2;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Drives one scripted player against a tick server")]
struct Args {
    /// Server address, e.g. 127.0.0.1:7777
    server: SocketAddr,

    /// Seconds to keep reporting movement
    #[clap(short, long, default_value = "10")]
    duration_secs: u32,
}

async fn send(socket: &UdpSocket, server: SocketAddr, channel: u8, packet: &Packet) {
    let mut datagram = vec![channel];
    datagram.extend_from_slice(&encode(packet).expect("encode failed"));
    if let Err(e) = socket.send_to(&datagram, server).await {
        eprintln!("send failed: {e}");
    }
}

async fn receive(socket: &UdpSocket) -> Option<Packet> {
    let mut buf = [0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .ok()?
        .ok()?;
    if len < 1 {
        return None;
    }
    match decode(&buf[1..len]) {
        Ok(packet) => Some(packet),
        Err(e) => {
            eprintln!("undecodable message: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    // Any datagram connects us; ask for the quadtree as an opener.
    println!("Connecting to {}", args.server);
    send(&socket, args.server, CHANNEL_RELIABLE, &Packet::DebugGetQuadtreeRequest).await;

    // The server answers a fresh peer with PlayerConnected followed by our
    // ObjectCreated broadcast; collect our object from either.
    let mut my_object: Option<ObjectData> = None;
    let mut my_id = 0;
    for _ in 0..32 {
        match receive(&socket).await {
            Some(Packet::PlayerConnected { object_id }) => {
                println!("Connected as object {object_id}");
                my_id = object_id;
            }
            Some(Packet::ObjectCreated { object }) if object.object_id == my_id => {
                my_object = Some(object);
                break;
            }
            Some(Packet::DebugGetQuadtreeResponse { rects }) => {
                println!("Quadtree has {} node rects", rects.len());
            }
            Some(other) => println!("  ... {:?}", other.message_type()),
            None => {}
        }
    }
    let mut my_object = my_object.ok_or("server never described our object")?;
    let origin = my_object.position;
    println!(
        "Spawned on {} at ({:.3}, {:.3})",
        my_object.current_map, origin.x, origin.y
    );

    let ticks = args.duration_secs * 10;
    let mut attacked = false;
    for i in 0..ticks {
        // Walk a small circle around the spawn point.
        let angle = i as f32 / 10.0;
        my_object.position = origin + Vec3::new(angle.cos() * 0.05, angle.sin() * 0.05, 0.0);
        my_object.velocity = Vec3::new(-angle.sin(), angle.cos(), 0.0) * (0.05 / 100.0);
        send(
            &socket,
            args.server,
            CHANNEL_UNRELIABLE,
            &Packet::ObjectStateUpdate {
                object: my_object.clone(),
            },
        )
        .await;

        if !attacked && i == ticks / 2 {
            attacked = true;
            println!("Requesting a melee attack");
            send(
                &socket,
                args.server,
                CHANNEL_RELIABLE,
                &Packet::BeginAttackRequest {
                    attacker_id: my_object.object_id,
                    attack_type: AttackType::Melee,
                    projectile_type: ProjectileType::None,
                },
            )
            .await;
        }

        // Report anything interesting the server pushed at us.
        while let Some(packet) = {
            let mut buf = [0u8; 2048];
            match socket.try_recv_from(&mut buf) {
                Ok((len, _)) if len > 1 => decode(&buf[1..len]).ok(),
                _ => None,
            }
        } {
            match packet {
                Packet::ObjectCreated { object } => {
                    println!(
                        "+ object {} ({:?}) at ({:.3}, {:.3})",
                        object.object_id, object.object_type, object.position.x, object.position.y
                    );
                }
                Packet::ObjectDestroyed { object_id } => {
                    println!("- object {object_id}");
                }
                Packet::BeginAttackResponse { allowed, charge_secs, .. } => {
                    println!("attack allowed={allowed} charge={charge_secs}s");
                }
                Packet::PlayerDisconnected { object_id } => {
                    println!("player {object_id} left");
                }
                Packet::ObjectStateUpdate { object } => {
                    // Snapshots arrive 40 times a second; sample our own.
                    if object.object_id == my_object.object_id && i % 10 == 0 {
                        println!(
                            "snapshot: ({:.3}, {:.3}) on {}",
                            object.position.x, object.position.y, object.current_map
                        );
                    }
                }
                other => println!("  ... {:?}", other.message_type()),
            }
        }

        sleep(Duration::from_millis(100)).await;
    }

    println!("Saying goodbye");
    socket.send_to(&[DISCONNECT_TAG], args.server).await?;

    println!("Test client finished");
    Ok(())
}
