//! Server network layer: datagram ingest and the fixed-rate ticks

use crate::config::ServerConfig;
use crate::game::GameState;
use crate::validation::SpeedLimit;
use log::{debug, error, info, warn};
use shared::{now_millis, Transport, MAX_DATAGRAM_SIZE};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Authoritative server bound to a UDP socket
pub struct Server {
    socket: Arc<UdpSocket>,
    game: Arc<GameState>,
    config: ServerConfig,
}

impl Server {
    /// Binds the server socket. Failing to bind is fatal for the caller.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket: Arc::new(socket),
            game: Arc::new(GameState::new(SpeedLimit::new(config.max_speed))),
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn game(&self) -> Arc<GameState> {
        Arc::clone(&self.game)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs until Ctrl+C
    pub async fn run(&self) -> io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down");
        })
        .await
    }

    /// Runs the ingest, broadcast and sweep tasks until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let tasks = vec![
            spawn_receiver(
                Arc::clone(&self.socket),
                Arc::clone(&self.game),
                stop_rx.clone(),
            ),
            spawn_broadcast_tick(
                Arc::clone(&self.socket),
                Arc::clone(&self.game),
                self.config.tick_interval(),
                stop_rx.clone(),
            ),
            spawn_sweep_tick(
                Arc::clone(&self.game),
                self.config.sweep_interval,
                self.config.disconnect_timeout,
                stop_rx,
            ),
        ];

        info!(
            "Server started: {} Hz broadcast, max speed {}, timeout {:?}",
            self.config.tick_rate, self.config.max_speed, self.config.disconnect_timeout
        );

        shutdown.await;

        let _ = stop_tx.send(true);
        for task in tasks {
            if let Err(e) = task.await {
                error!("Server task panicked: {}", e);
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Spawns the task that reads datagrams and hands each one to its own ingest task
pub fn spawn_receiver<T>(
    transport: Arc<T>,
    game: Arc<GameState>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    T: Transport + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                result = transport.recv_from(&mut buffer) => match result {
                    Ok((len, addr)) => {
                        let data = buffer[..len].to_vec();
                        let game = Arc::clone(&game);
                        tokio::spawn(async move {
                            if let Err(e) = game.handle_datagram(&data, addr) {
                                warn!("Dropping datagram from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        debug!("Receiver stopped");
    })
}

/// Spawns the fixed-rate broadcast of every participant to every address
pub fn spawn_broadcast_tick<T>(
    transport: Arc<T>,
    game: Arc<GameState>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    T: Transport + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let report = game.broadcast(transport.as_ref()).await;
                    if !report.evicted.is_empty() {
                        info!("Evicted addresses of participants {:?}", report.evicted);
                    }
                }
            }
        }

        debug!("Broadcast tick stopped");
    })
}

/// Spawns the disconnect sweep on its own, slower timer
pub fn spawn_sweep_tick(
    game: Arc<GameState>,
    period: Duration,
    timeout: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick fires immediately and there is nothing to sweep yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    game.sweep(timeout, now_millis());
                }
            }
        }

        debug!("Sweep tick stopped");
    })
}
