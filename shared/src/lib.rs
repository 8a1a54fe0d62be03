pub mod buildings;
pub mod cities;
pub mod items;
pub mod npcs;
pub mod protocol;
pub mod ranks;
pub mod settings;

pub use buildings::*;
pub use cities::*;
pub use items::*;
pub use npcs::*;
pub use protocol::*;
pub use ranks::*;
