//! Street-level text MMO server
//!
//! An authoritative, actor-based simulation: every map cell, city and the
//! world roster run as their own tasks, sessions connect over TCP.

mod behavior;
mod combat;
mod commands;
mod config;
mod economy;
mod entities;
mod error;
mod network;
mod persistence;
mod session;
mod templates;
mod world;

use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{ServerConfig, Timings};
use crate::entities::RandomRoller;
use crate::network::Server;
use crate::persistence::{MemoryStore, Persistence};
use crate::templates::Templates;
use crate::world::World;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();
    info!("Starting server...");

    // Initialize persistence (database + cache)
    let persistence: Arc<dyn Persistence> =
        match persistence::init(&config.database_url, &config.redis_url).await {
            Ok(handle) => {
                info!("Persistence layer initialized");
                Arc::new(handle)
            }
            Err(e) => {
                error!("Failed to initialize persistence: {}", e);
                warn!("Running with in-memory storage, nothing survives a restart");
                Arc::new(MemoryStore::new())
            }
        };

    let templates = match Templates::builtin() {
        Ok(templates) => Arc::new(templates),
        Err(e) => {
            error!("Invalid templates: {}", e);
            return;
        }
    };

    let world = match World::start(templates, Timings::default(), Arc::new(RandomRoller), persistence) {
        Ok(world) => world,
        Err(e) => {
            error!("Failed to start the world: {}", e);
            return;
        }
    };

    let server = match Server::bind(&config.bind_addr, world.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return;
        }
    };
    match server.local_addr() {
        Ok(addr) => info!("Server started successfully on {}", addr),
        Err(_) => info!("Server started successfully!"),
    }
    let accept_loop = tokio::spawn(server.run());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down, saving every player");
    world.save_all().await;
    world.shutdown();
    let _ = accept_loop.await;
}
