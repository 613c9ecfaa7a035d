//! Integration tests for the position-sync server and client
//!
//! These tests run real components against each other over loopback UDP.

use client::config::ClientConfig;
use client::input::{Command, Direction};
use client::network::Client;
use server::config::ServerConfig;
use server::game::GameState;
use server::network::Server;
use shared::{
    decode, encode, now_millis, ParticipantId, PositionRecord, MAX_SPEED, RECORD_SIZE,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

struct RunningServer {
    addr: SocketAddr,
    game: Arc<GameState>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    async fn start(config: ServerConfig) -> Self {
        let server = Server::bind(ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..config
        })
        .await
        .expect("Failed to bind server");

        let addr = server.local_addr().unwrap();
        let game = server.game();
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .run_until(async {
                    let _ = stopped.await;
                })
                .await
        });

        RunningServer {
            addr,
            game,
            stop,
            handle,
        }
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }
}

fn fast_server() -> ServerConfig {
    ServerConfig {
        tick_rate: 50,
        ..ServerConfig::default()
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}

async fn send(socket: &UdpSocket, record: PositionRecord, to: SocketAddr) {
    socket.send_to(&encode(&record).unwrap(), to).await.unwrap();
}

/// Collects broadcast records until `done` holds for the latest record per participant
async fn collect_until<F>(socket: &UdpSocket, done: F) -> HashMap<ParticipantId, PositionRecord>
where
    F: Fn(&HashMap<ParticipantId, PositionRecord>) -> bool,
{
    let mut seen = HashMap::new();
    let mut buffer = [0u8; 1024];

    while !done(&seen) {
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("broadcast should arrive")
            .unwrap();
        let record = decode(&buffer[..len]).unwrap();
        seen.insert(record.id, record);
    }

    seen
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Records survive a real UDP hop byte for byte
    #[tokio::test]
    async fn record_over_udp_socket() {
        let echo = std::net::UdpSocket::bind("127.0.0.1:0").expect("Failed to bind echo socket");
        let echo_addr = echo.local_addr().unwrap();

        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, from)) = echo.recv_from(&mut buf) {
                let _ = echo.send_to(&buf[..size], from);
            }
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let record = PositionRecord::new(-7, 12.5, -0.25, now_millis(), u32::MAX);
        send(&socket, record, echo_addr).await;

        let mut buf = [0; 1024];
        let (size, _) = timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
            .await
            .expect("echo should arrive")
            .unwrap();

        assert_eq!(size, RECORD_SIZE);
        assert_eq!(decode(&buf[..size]).unwrap(), record);
    }

    /// The layout is bincode's default fixed-width little-endian encoding
    #[test]
    fn wire_layout_matches_plain_bincode() {
        let record = PositionRecord::new(3, 1.5, 2.5, 1_700_000_000_000, 42);
        let plain = bincode::serialize(&record).unwrap();
        assert_eq!(plain, encode(&record).unwrap());
        assert_eq!(plain.len(), RECORD_SIZE);
    }
}

/// The client paces its own moves so the server's default check accepts them
mod pacing_tests {
    use super::*;
    use client::game::LocalPlayer;
    use server::validation::SpeedLimit;
    use shared::{BOARD_HEIGHT, BOARD_WIDTH};

    #[test]
    fn paced_steps_pass_default_speed_limit() {
        let limit = SpeedLimit::default();
        let mut player = LocalPlayer::new(1, BOARD_WIDTH, BOARD_HEIGHT);
        let tick = 33;
        let mut now = 1_700_000_000_000;
        let mut previous = player.next_update(now);

        for step in 0..60 {
            now += tick;
            let candidate = match step {
                0 => player.move_and_update(Direction::Right, now).unwrap(),
                1 => player.move_and_update(Direction::Right, now).unwrap(),
                2 => player.move_and_update(Direction::Up, now).unwrap(),
                _ => player.next_update(now),
            };

            let validation = limit.validate(&previous, candidate);
            assert!(!validation.is_clamped(), "step {} was clamped", step);
            previous = validation.record();
        }

        assert_eq!((previous.x, previous.y), (12.0, 4.0));
    }
}

/// AUTHORITATIVE SERVER TESTS
mod server_tests {
    use super::*;

    #[tokio::test]
    async fn broadcasts_every_participant_to_every_sender() {
        let server = RunningServer::start(fast_server()).await;
        let alice = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bob = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let now = now_millis();
        send(&alice, PositionRecord::new(1, 2.0, 3.0, now, 1), server.addr).await;
        send(&bob, PositionRecord::new(2, 4.0, 5.0, now, 1), server.addr).await;

        for socket in [&alice, &bob] {
            let seen = collect_until(socket, |seen| seen.len() == 2).await;
            assert_eq!((seen[&1].x, seen[&1].y), (2.0, 3.0));
            assert_eq!((seen[&2].x, seen[&2].y), (4.0, 5.0));
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn stale_sequences_are_discarded() {
        let server = RunningServer::start(fast_server()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let registry = || server.game.registry();
        let base = now_millis();

        send(&socket, PositionRecord::new(1, 1.0, 0.0, base, 5), server.addr).await;
        assert!(wait_for(|| registry().last_sequence(1) == Some(5)).await);

        send(&socket, PositionRecord::new(1, 2.0, 0.0, base + 1_000, 3), server.addr).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(registry().last_sequence(1), Some(5));
        assert_eq!(registry().get(1).unwrap().x, 1.0);

        send(&socket, PositionRecord::new(1, 3.0, 0.0, base + 2_000, 7), server.addr).await;
        assert!(wait_for(|| registry().last_sequence(1) == Some(7)).await);

        send(&socket, PositionRecord::new(1, 4.0, 0.0, base + 3_000, 5), server.addr).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(registry().last_sequence(1), Some(7));
        assert_eq!(registry().get(1).unwrap().x, 3.0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn speeding_updates_are_clamped() {
        let server = RunningServer::start(fast_server()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let registry = || server.game.registry();
        let base = now_millis();

        send(&socket, PositionRecord::new(1, 0.0, 0.0, base, 1), server.addr).await;
        assert!(wait_for(|| registry().contains(1)).await);

        send(&socket, PositionRecord::new(1, 5.0, 0.0, base + 1_000, 2), server.addr).await;
        assert!(wait_for(|| registry().last_sequence(1) == Some(2)).await);
        assert_eq!(registry().get(1).unwrap().x, 5.0);

        send(&socket, PositionRecord::new(1, 50.0, 0.0, base + 2_000, 3), server.addr).await;
        assert!(wait_for(|| registry().last_sequence(1) == Some(3)).await);

        let clamped = registry().get(1).unwrap();
        assert_eq!((clamped.x, clamped.y), (5.0, 0.0));
        assert_eq!(clamped.timestamp, base + 2_000);

        // Other participants see the clamped position
        let seen = collect_until(&socket, |seen| {
            seen.get(&1).map_or(false, |r| r.sequence == 3)
        })
        .await;
        assert_eq!(seen[&1].x, 5.0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn silent_participants_are_swept() {
        let server = RunningServer::start(ServerConfig {
            disconnect_timeout: Duration::from_millis(150),
            sweep_interval: Duration::from_millis(20),
            ..fast_server()
        })
        .await;
        let quiet = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let chatty = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let registry = || server.game.registry();

        send(&quiet, PositionRecord::new(1, 1.0, 1.0, now_millis(), 1), server.addr).await;
        assert!(wait_for(|| registry().contains(1)).await);

        // Keep participant 2 alive while 1 goes silent
        let mut sequence = 1;
        let mut swept = false;
        for _ in 0..40 {
            send(&chatty, PositionRecord::new(2, 2.0, 2.0, now_millis(), sequence), server.addr)
                .await;
            sequence += 1;
            sleep(Duration::from_millis(25)).await;
            if !registry().contains(1) {
                swept = true;
                break;
            }
        }

        assert!(swept, "silent participant should be swept");
        assert!(registry().contains(2));
        assert_eq!(registry().address(1), None);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn garbage_datagrams_are_ignored() {
        let server = RunningServer::start(fast_server()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        socket.send_to(&[], server.addr).await.unwrap();
        socket.send_to(&[0xAB; 10], server.addr).await.unwrap();
        socket.send_to(&[0xCD; RECORD_SIZE + 1], server.addr).await.unwrap();
        send(&socket, PositionRecord::new(4, 1.0, 1.0, now_millis(), 1), server.addr).await;

        assert!(wait_for(|| server.game.registry().contains(4)).await);
        assert_eq!(server.game.registry().len(), 1);

        server.shutdown().await;
    }
}

/// CLIENT AND SERVER TOGETHER
mod session_tests {
    use super::*;

    struct RunningClient {
        commands: mpsc::UnboundedSender<Command>,
        view: Arc<client::game::RemoteView>,
        handle: JoinHandle<std::io::Result<()>>,
    }

    async fn start_client(server: SocketAddr, id: ParticipantId) -> RunningClient {
        start_client_with(ClientConfig {
            server_addr: server.to_string(),
            id,
            tick_rate: 50,
            headless: true,
            ..ClientConfig::default()
        })
        .await
    }

    async fn start_client_with(config: ClientConfig) -> RunningClient {
        let client = Client::connect(config)
            .await
            .expect("Failed to start client");

        let view = client.view();
        let (commands, inbox) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            client
                .run_until(inbox, std::future::pending::<()>())
                .await
        });

        RunningClient {
            commands,
            view,
            handle,
        }
    }

    async fn quit(client: RunningClient) {
        client.commands.send(Command::Quit).unwrap();
        timeout(Duration::from_secs(2), client.handle)
            .await
            .expect("client should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn clients_see_each_other_and_moves_reach_server() {
        let server = RunningServer::start(fast_server()).await;
        assert_eq!(server.game.speed_limit().max_speed(), MAX_SPEED);

        let first = start_client(server.addr, 1).await;
        let second = start_client(server.addr, 2).await;

        assert!(wait_for(|| first.view.get(2).is_some() && second.view.get(1).is_some()).await);
        assert!(first.view.get(1).is_none(), "own echo is not a remote player");

        let registry = || server.game.registry();
        assert_eq!(registry().get(1).map(|r| (r.x, r.y)), Some((10.0, 5.0)));

        first.commands.send(Command::Move(Direction::Right)).unwrap();
        assert!(wait_for(|| registry().get(1).map_or(false, |r| r.x == 11.0)).await);

        first.commands.send(Command::Move(Direction::Up)).unwrap();
        assert!(wait_for(|| registry().get(1).map_or(false, |r| r.y == 4.0)).await);

        // The move shows up on the other client once smoothing converges
        assert!(wait_for(|| second.view.get(1).map_or(false, |r| (r.x - 11.0).abs() < 0.5)).await);

        quit(first).await;
        quit(second).await;
        server.shutdown().await;
    }

    /// Stock settings on both sides: a single step lands on the server
    /// instead of being clamped against the heartbeats before it
    #[tokio::test]
    async fn single_step_lands_with_stock_settings() {
        let server = RunningServer::start(ServerConfig::default()).await;
        let stock = |id| ClientConfig {
            server_addr: server.addr.to_string(),
            id,
            headless: true,
            ..ClientConfig::default()
        };

        let mover = start_client_with(stock(5)).await;
        let watcher = start_client_with(stock(6)).await;

        let registry = || server.game.registry();
        assert!(wait_for(|| registry().contains(5) && registry().contains(6)).await);
        sleep(Duration::from_millis(200)).await;

        mover.commands.send(Command::Move(Direction::Right)).unwrap();
        sleep(Duration::from_millis(1_500)).await;

        let stored = registry().get(5).expect("mover is registered");
        assert_eq!((stored.x, stored.y), (11.0, 5.0));
        assert!(wait_for(|| watcher.view.get(5).map_or(false, |r| (r.x - 11.0).abs() < 0.5)).await);

        // Idle heartbeats afterwards keep the new cell
        sleep(Duration::from_millis(200)).await;
        assert_eq!(registry().get(5).map(|r| r.x), Some(11.0));

        quit(mover).await;
        quit(watcher).await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn heartbeats_keep_idle_client_alive() {
        let server = RunningServer::start(ServerConfig {
            disconnect_timeout: Duration::from_millis(150),
            sweep_interval: Duration::from_millis(20),
            ..fast_server()
        })
        .await;

        let idle = start_client(server.addr, 3).await;
        let registry = || server.game.registry();
        assert!(wait_for(|| registry().contains(3)).await);

        let first_sequence = registry().last_sequence(3).unwrap();
        sleep(Duration::from_millis(400)).await;

        assert!(registry().contains(3));
        assert!(registry().last_sequence(3).unwrap() > first_sequence);

        quit(idle).await;

        // Once the client is gone the sweep removes it
        assert!(wait_for(|| !registry().contains(3)).await);

        server.shutdown().await;
    }
}
