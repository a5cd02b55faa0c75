//! Transport layer: contract, UDP adapter and loopback
//!
//! The tick engine talks to the network through the [`Transport`] trait:
//! a non-blocking event poll (connects, datagrams, disconnects), send and
//! broadcast primitives over two channels, and a millisecond clock. The
//! simulation thread never blocks on any of these.
//!
//! [`UdpTransport`] is the production adapter. It keeps socket work off
//! the simulation loop: one tokio task feeds received datagrams into an
//! unbounded channel, another drains outgoing datagrams to the socket, and
//! `poll_event` just empties the inbound channel. Peers are implicit: the
//! first datagram from an unknown address is a connect, and a session ends
//! on an explicit goodbye datagram or five seconds of silence. Every
//! datagram is prefixed with a one-byte channel tag; actual redelivery of
//! lost reliable datagrams is the concern of the reliable-UDP library this
//! adapter stands in for.
//!
//! [`LoopbackTransport`] is an in-memory implementation for tests and
//! local tooling: events are scripted in, outgoing traffic is captured,
//! and the clock is advanced by hand.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::peers::{PeerId, PeerTable};

/// Transport channels; the discriminant is the wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    Reliable = 0,
    Unreliable = 1,
}

/// Connection-level events surfaced to the tick engine
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected { peer: PeerId },
    Received { peer: PeerId, data: Vec<u8> },
    Disconnected { peer: PeerId },
}

/// What the tick engine requires from a transport
///
/// All methods are called from the simulation thread only and must never
/// block it.
pub trait Transport {
    /// Next pending event, if any; never blocks.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Sends to a single peer; unknown peers are silently ignored.
    fn send(&mut self, peer: PeerId, channel: Channel, data: &[u8]);

    /// Sends to every connected peer.
    fn broadcast(&mut self, channel: Channel, data: &[u8]);

    /// Milliseconds since the transport came up
    fn now_ms(&self) -> u64;
}

/// Seconds between timeout sweeps over the peer table
const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Leading byte of an explicit goodbye datagram; distinct from both
/// channel tags
pub const DISCONNECT_TAG: u8 = 2;

/// Production transport over a tokio UDP socket
pub struct UdpTransport {
    peers: PeerTable,
    pending: VecDeque<TransportEvent>,
    inbound_rx: mpsc::UnboundedReceiver<(SocketAddr, Vec<u8>)>,
    outbound_tx: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
    local_addr: SocketAddr,
    epoch: Instant,
    last_timeout_sweep: Instant,
}

impl UdpTransport {
    /// Binds the socket and spawns the receiver and sender tasks
    pub async fn bind(addr: &str, max_peers: usize) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let local_addr = socket.local_addr()?;
        info!("Transport listening on {local_addr}");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        spawn_receiver(Arc::clone(&socket), inbound_tx);
        spawn_sender(socket, outbound_rx);

        let now = Instant::now();
        Ok(Self {
            peers: PeerTable::new(max_peers),
            pending: VecDeque::new(),
            inbound_rx,
            outbound_tx,
            local_addr,
            epoch: now,
            last_timeout_sweep: now,
        })
    }

    /// Address the socket actually bound, useful with port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn drain_socket(&mut self) {
        while let Ok((addr, datagram)) = self.inbound_rx.try_recv() {
            if datagram.is_empty() {
                continue;
            }

            // An explicit goodbye ends the session without waiting out the
            // silence timeout.
            if datagram[0] == DISCONNECT_TAG {
                if let Some(peer) = self.peers.find_by_addr(addr) {
                    self.peers.remove_peer(peer);
                    self.pending.push_back(TransportEvent::Disconnected { peer });
                }
                continue;
            }

            // Leading channel tag; inbound it only proves framing.
            let payload = datagram[1..].to_vec();

            match self.peers.find_by_addr(addr) {
                Some(peer) => {
                    self.peers.touch(peer);
                    self.pending.push_back(TransportEvent::Received { peer, data: payload });
                }
                None => match self.peers.add_peer(addr) {
                    Some(peer) => {
                        self.pending.push_back(TransportEvent::Connected { peer });
                        self.pending.push_back(TransportEvent::Received { peer, data: payload });
                    }
                    None => {
                        warn!("Dropping datagram from {addr}: peer table full");
                    }
                },
            }
        }
    }

    fn sweep_timeouts(&mut self) {
        if self.last_timeout_sweep.elapsed() < TIMEOUT_SWEEP_INTERVAL {
            return;
        }
        self.last_timeout_sweep = Instant::now();
        for peer in self.peers.check_timeouts() {
            self.pending.push_back(TransportEvent::Disconnected { peer });
        }
    }

    fn frame(channel: Channel, data: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(1 + data.len());
        framed.push(channel as u8);
        framed.extend_from_slice(data);
        framed
    }
}

impl Transport for UdpTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        self.drain_socket();
        self.sweep_timeouts();
        self.pending.pop_front()
    }

    fn send(&mut self, peer: PeerId, channel: Channel, data: &[u8]) {
        let Some(addr) = self.peers.addr_of(peer) else {
            return;
        };
        if self.outbound_tx.send((addr, Self::frame(channel, data))).is_err() {
            error!("Outbound task gone; dropping send to peer {peer}");
        }
    }

    fn broadcast(&mut self, channel: Channel, data: &[u8]) {
        let framed = Self::frame(channel, data);
        for (peer, addr) in self.peers.peer_addrs() {
            if self.outbound_tx.send((addr, framed.clone())).is_err() {
                error!("Outbound task gone; dropping broadcast to peer {peer}");
                return;
            }
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

fn spawn_receiver(socket: Arc<UdpSocket>, inbound_tx: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>) {
    tokio::spawn(async move {
        let mut buffer = [0u8; 2048];
        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => {
                    if inbound_tx.send((addr, buffer[..len].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error receiving datagram: {e}");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    });
}

fn spawn_sender(socket: Arc<UdpSocket>, mut outbound_rx: mpsc::UnboundedReceiver<(SocketAddr, Vec<u8>)>) {
    tokio::spawn(async move {
        while let Some((addr, datagram)) = outbound_rx.recv().await {
            if let Err(e) = socket.send_to(&datagram, addr).await {
                error!("Failed to send to {addr}: {e}");
            }
        }
    });
}

/// In-memory transport: scripted input, captured output, manual clock
#[derive(Default)]
pub struct LoopbackTransport {
    events: VecDeque<TransportEvent>,
    sent: Vec<(PeerId, Channel, Vec<u8>)>,
    broadcasts: Vec<(Channel, Vec<u8>)>,
    peers: Vec<PeerId>,
    now: u64,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connect(&mut self, peer: PeerId) {
        self.peers.push(peer);
        self.events.push_back(TransportEvent::Connected { peer });
    }

    pub fn push_receive(&mut self, peer: PeerId, data: Vec<u8>) {
        self.events.push_back(TransportEvent::Received { peer, data });
    }

    pub fn push_disconnect(&mut self, peer: PeerId) {
        self.peers.retain(|p| *p != peer);
        self.events.push_back(TransportEvent::Disconnected { peer });
    }

    pub fn advance_time(&mut self, ms: u64) {
        self.now += ms;
    }

    /// Drains everything sent to one peer since the last call
    pub fn take_sent(&mut self) -> Vec<(PeerId, Channel, Vec<u8>)> {
        std::mem::take(&mut self.sent)
    }

    /// Drains everything broadcast since the last call
    pub fn take_broadcasts(&mut self) -> Vec<(Channel, Vec<u8>)> {
        std::mem::take(&mut self.broadcasts)
    }
}

impl Transport for LoopbackTransport {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn send(&mut self, peer: PeerId, channel: Channel, data: &[u8]) {
        self.sent.push((peer, channel, data.to_vec()));
    }

    fn broadcast(&mut self, channel: Channel, data: &[u8]) {
        self.broadcasts.push((channel, data.to_vec()));
    }

    fn now_ms(&self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for_event(transport: &mut UdpTransport) -> TransportEvent {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(event) = transport.poll_event() {
                return event;
            }
            assert!(Instant::now() < deadline, "no transport event within 2 s");
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn first_datagram_connects_then_delivers() {
        let mut transport = UdpTransport::bind("127.0.0.1:0", 4).await.unwrap();
        let server_addr = transport.local_addr();

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .send_to(&[Channel::Reliable as u8, 1, 2, 3], server_addr)
            .unwrap();

        let first = wait_for_event(&mut transport).await;
        assert!(matches!(first, TransportEvent::Connected { peer: 1 }));
        let second = wait_for_event(&mut transport).await;
        match second {
            TransportEvent::Received { peer, data } => {
                assert_eq!(peer, 1);
                assert_eq!(data, vec![1, 2, 3]);
            }
            other => panic!("expected Received, got {other:?}"),
        }

        // Second datagram from the same address is not a new connect.
        client
            .send_to(&[Channel::Unreliable as u8, 9], server_addr)
            .unwrap();
        let third = wait_for_event(&mut transport).await;
        assert!(matches!(third, TransportEvent::Received { peer: 1, .. }));
    }

    #[tokio::test]
    async fn send_frames_the_channel_tag() {
        let mut transport = UdpTransport::bind("127.0.0.1:0", 4).await.unwrap();
        let server_addr = transport.local_addr();
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        client
            .send_to(&[Channel::Reliable as u8, 7], server_addr)
            .unwrap();

        let connected = wait_for_event(&mut transport).await;
        let TransportEvent::Connected { peer } = connected else {
            panic!("expected Connected, got {connected:?}");
        };
        let _ = wait_for_event(&mut transport).await;

        transport.send(peer, Channel::Reliable, &[42, 43]);
        let mut buf = [0u8; 64];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[Channel::Reliable as u8, 42, 43]);

        transport.broadcast(Channel::Unreliable, &[1]);
        let (len, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[Channel::Unreliable as u8, 1]);
    }

    #[tokio::test]
    async fn goodbye_datagram_disconnects_immediately() {
        let mut transport = UdpTransport::bind("127.0.0.1:0", 4).await.unwrap();
        let server_addr = transport.local_addr();
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();

        client
            .send_to(&[Channel::Reliable as u8, 5], server_addr)
            .unwrap();
        let connected = wait_for_event(&mut transport).await;
        let TransportEvent::Connected { peer } = connected else {
            panic!("expected Connected, got {connected:?}");
        };
        let _ = wait_for_event(&mut transport).await;

        client.send_to(&[DISCONNECT_TAG], server_addr).unwrap();
        let event = wait_for_event(&mut transport).await;
        assert_eq!(event, TransportEvent::Disconnected { peer });

        // A later datagram from the same address is a brand-new session.
        client
            .send_to(&[Channel::Reliable as u8, 6], server_addr)
            .unwrap();
        let event = wait_for_event(&mut transport).await;
        match event {
            TransportEvent::Connected { peer: new_peer } => assert_ne!(new_peer, peer),
            other => panic!("expected a fresh Connected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clock_advances() {
        let transport = UdpTransport::bind("127.0.0.1:0", 4).await.unwrap();
        let first = transport.now_ms();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.now_ms() >= first + 15);
    }

    #[test]
    fn loopback_scripts_events_and_captures_output() {
        let mut transport = LoopbackTransport::new();
        transport.push_connect(3);
        transport.push_receive(3, vec![1, 2]);
        transport.push_disconnect(3);

        assert_eq!(
            transport.poll_event(),
            Some(TransportEvent::Connected { peer: 3 })
        );
        assert_eq!(
            transport.poll_event(),
            Some(TransportEvent::Received {
                peer: 3,
                data: vec![1, 2]
            })
        );
        assert_eq!(
            transport.poll_event(),
            Some(TransportEvent::Disconnected { peer: 3 })
        );
        assert_eq!(transport.poll_event(), None);

        transport.send(3, Channel::Reliable, &[9]);
        transport.broadcast(Channel::Unreliable, &[8]);
        assert_eq!(transport.take_sent(), vec![(3, Channel::Reliable, vec![9])]);
        assert_eq!(
            transport.take_broadcasts(),
            vec![(Channel::Unreliable, vec![8])]
        );

        transport.advance_time(25);
        assert_eq!(transport.now_ms(), 25);
    }
}
