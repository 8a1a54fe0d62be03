//! TCP transport. Each connection is one session: text commands come in
//! one per line, length-prefixed `bincode` events go out.

mod server;

pub use server::Server;
