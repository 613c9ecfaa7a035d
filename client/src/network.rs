//! Client network layer: local updates out, server broadcasts in

use crate::config::ClientConfig;
use crate::game::{LocalPlayer, RemoteView};
use crate::input::Command;
use crate::rendering::{Board, CLEAR_SCREEN};
use log::{debug, error, info, warn};
use shared::{decode, encode, now_millis, PositionRecord, Transport, MAX_DATAGRAM_SIZE};
use std::future::Future;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub struct Client {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    player: Arc<Mutex<LocalPlayer>>,
    view: Arc<RemoteView>,
    board: Board,
    config: ClientConfig,
}

impl Client {
    /// Resolves the server and binds an ephemeral local socket of the same family
    pub async fn connect(config: ClientConfig) -> io::Result<Self> {
        let server_addr = lookup_host(&config.server_addr).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no address found for {}", config.server_addr),
            )
        })?;

        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        info!(
            "Client {} bound to {}, server at {}",
            config.id,
            socket.local_addr()?,
            server_addr
        );

        let board = Board::default();
        let player =
            LocalPlayer::new(config.id, board.width, board.height).with_max_speed(config.max_speed);
        let view = RemoteView::new(config.id, config.smoothing, config.horizon_ms);

        Ok(Client {
            socket: Arc::new(socket),
            server_addr,
            player: Arc::new(Mutex::new(player)),
            view: Arc::new(view),
            board,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn view(&self) -> Arc<RemoteView> {
        Arc::clone(&self.view)
    }

    pub async fn player(&self) -> LocalPlayer {
        self.player.lock().await.clone()
    }

    /// Runs until Ctrl+C or a quit command
    pub async fn run(&self, commands: mpsc::UnboundedReceiver<Command>) -> io::Result<()> {
        self.run_until(commands, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down");
        })
        .await
    }

    /// Runs the receiver, heartbeat and display tasks and applies commands
    /// until a quit command arrives or `shutdown` completes.
    ///
    /// A closed command channel only stops input; the session keeps running.
    pub async fn run_until<F>(
        &self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        shutdown: F,
    ) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let tick = self.config.tick_interval();

        let tasks = vec![
            spawn_receiver(
                Arc::clone(&self.socket),
                self.server_addr,
                Arc::clone(&self.view),
                Arc::clone(&self.player),
                stop_rx.clone(),
            ),
            spawn_heartbeat_tick(
                Arc::clone(&self.socket),
                self.server_addr,
                Arc::clone(&self.player),
                tick,
                stop_rx.clone(),
            ),
            spawn_display_tick(
                Arc::clone(&self.view),
                Arc::clone(&self.player),
                self.board,
                tick,
                self.config.headless,
                stop_rx,
            ),
        ];

        info!("Controls: W/A/S/D to move, Q to quit");

        tokio::pin!(shutdown);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Move(direction)) => {
                        let update = self
                            .player
                            .lock()
                            .await
                            .move_and_update(direction, now_millis());

                        if let Some(record) = update {
                            if let Err(e) =
                                send_record(self.socket.as_ref(), self.server_addr, &record).await
                            {
                                error!("Error sending update: {}", e);
                            }
                        }
                    }
                    Some(Command::Quit) => {
                        info!("Quit requested");
                        break;
                    }
                    None => {
                        debug!("Input closed");
                        commands_open = false;
                    }
                },
            }
        }

        let _ = stop_tx.send(true);
        for task in tasks {
            if let Err(e) = task.await {
                error!("Client task panicked: {}", e);
            }
        }

        info!("Client stopped");
        Ok(())
    }
}

/// Encodes and sends one record to the server
pub async fn send_record<T>(
    transport: &T,
    server_addr: SocketAddr,
    record: &PositionRecord,
) -> io::Result<()>
where
    T: Transport + ?Sized,
{
    let data = encode(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    transport.send_to(&data, server_addr).await?;
    Ok(())
}

/// Sends the current position if no input-driven update went out within `interval`.
/// Returns the record that was sent, if any.
pub async fn send_heartbeat<T>(
    transport: &T,
    server_addr: SocketAddr,
    player: &Mutex<LocalPlayer>,
    interval: Duration,
) -> io::Result<Option<PositionRecord>>
where
    T: Transport + ?Sized,
{
    let update = player.lock().await.heartbeat(interval, now_millis());

    match update {
        Some(record) => {
            send_record(transport, server_addr, &record).await?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// Spawns the task that reads broadcasts from the server. Datagrams from any
/// other source are ignored. Our own record goes to the local player for
/// reconciliation, everyone else's to the remote view.
pub fn spawn_receiver<T>(
    transport: Arc<T>,
    server_addr: SocketAddr,
    view: Arc<RemoteView>,
    player: Arc<Mutex<LocalPlayer>>,
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
                    Ok((len, addr)) if addr == server_addr => {
                        let data = buffer[..len].to_vec();
                        let view = Arc::clone(&view);
                        let player = Arc::clone(&player);
                        tokio::spawn(async move {
                            match decode(&data) {
                                Ok(record) if record.id == view.local_id() => {
                                    if player.lock().await.reconcile(&record) {
                                        warn!(
                                            "Server kept us at ({:.2}, {:.2}) for seq {}",
                                            record.x, record.y, record.sequence
                                        );
                                    }
                                }
                                Ok(record) => {
                                    view.apply_update(record);
                                }
                                Err(e) => warn!("Dropping datagram from server: {}", e),
                            }
                        });
                    }
                    Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
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

pub fn spawn_heartbeat_tick<T>(
    transport: Arc<T>,
    server_addr: SocketAddr,
    player: Arc<Mutex<LocalPlayer>>,
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
                    if let Err(e) =
                        send_heartbeat(transport.as_ref(), server_addr, &player, period).await
                    {
                        error!("Error sending heartbeat: {}", e);
                    }
                }
            }
        }

        debug!("Heartbeat tick stopped");
    })
}

/// Spawns the redraw loop: dead-reckon remote players, then draw the board
pub fn spawn_display_tick(
    view: Arc<RemoteView>,
    player: Arc<Mutex<LocalPlayer>>,
    board: Board,
    period: Duration,
    headless: bool,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    view.advance(now_millis());

                    if !headless {
                        let local = player.lock().await.position();
                        let frame = board.frame(local, &view.positions());
                        let mut stdout = io::stdout().lock();
                        let _ = write!(stdout, "{}{}", CLEAR_SCREEN, frame);
                        let _ = stdout.flush();
                    }
                }
            }
        }

        debug!("Display tick stopped");
    })
}
