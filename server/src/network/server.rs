//! TCP game server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use swi_shared::{ServerEvent, PROTOCOL_VERSION};

use crate::commands::{self, CommandResult, LOGIN_HELP};
use crate::entities::Entity;
use crate::session::{ChannelSession, Session};
use crate::world::World;

const MOTD: &[&str] = &[
    "Welcome to the streets.",
    "Log in with /login <username> <password>",
    "or create a character with /register <username> <password> <hometown>.",
];

/// Game server
pub struct Server {
    listener: TcpListener,
    world: World,
}

impl Server {
    pub async fn bind(addr: &str, world: World) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {} (protocol v{})", listener.local_addr()?, PROTOCOL_VERSION);
        Ok(Self { listener, world })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the world shuts down
    pub async fn run(self) {
        let mut shutdown = self.world.shutdown_receiver();
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Connection from {}", peer);
                        tokio::spawn(handle_connection(stream, peer, self.world.clone()));
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
            }
        }
        info!("Server stopped accepting connections");
    }
}

/// Drains the session queue onto the socket
async fn write_events(mut writer: OwnedWriteHalf, mut events: mpsc::Receiver<ServerEvent>) {
    while let Some(event) = events.recv().await {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                continue;
            }
        };
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, world: World) {
    let (reader, writer) = stream.into_split();
    let (session, events) = ChannelSession::new();
    let session = Arc::new(session);
    let writer_task = tokio::spawn(write_events(writer, events));

    session.deliver(ServerEvent::normal(MOTD.join("\n")));

    let mut lines = BufReader::new(reader).lines();
    let mut shutdown = world.shutdown_receiver();
    let mut player: Option<Arc<Entity>> = None;

    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!("Read from {} failed: {}", peer, e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match &player {
            Some(entity) => {
                commands::parse_and_execute(&world, entity, line)
                    .await
                    .deliver(&world, entity);
            }
            None => {
                player = before_login(&world, &session, line).await;
                if let Some(entity) = &player {
                    info!("{} logged in from {}", entity.name, peer);
                }
            }
        }
    }

    session.disconnect();
    if let Some(entity) = player {
        world.logout(entity).await;
    }
    writer_task.abort();
    debug!("Connection from {} closed", peer);
}

/// Only `/login`, `/register`, `/help`, `/npcs` and `/refresh` are open to a
/// session that is not in the world
async fn before_login(world: &World, session: &Arc<ChannelSession>, line: &str) -> Option<Arc<Entity>> {
    let reply = |result: CommandResult| {
        if let Some(event) = result.to_event() {
            session.deliver(event);
        }
    };
    let Some(command) = commands::parse(line) else {
        reply(CommandResult::error("You need to /login or /register first."));
        return None;
    };

    let handle: Arc<dyn Session> = session.clone();
    let entered = match command.name.as_str() {
        "login" => commands::login(world, handle, &command.args).await,
        "register" => commands::register(world, handle, &command.args).await,
        "help" => Err(CommandResult::lines(LOGIN_HELP.iter().map(|l| l.to_string()).collect())),
        "npcs" => Err(commands::npc_table(world.templates())),
        "refresh" => Err(CommandResult::info(MOTD.join("\n"))),
        _ => Err(CommandResult::error("You need to /login or /register first.")),
    };
    match entered {
        Ok(entity) => Some(entity),
        Err(result) => {
            reply(result);
            None
        }
    }
}
