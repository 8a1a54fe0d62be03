//! Slash command system.
//!
//! A line is parsed into a command key and its arguments, dispatched to the
//! handler of its group, and the handler's [`CommandResult`] is delivered
//! back to the player. Handlers reject with a [`GameError`]; its text is
//! what the player sees.

mod account;
mod admin;
mod buildings;
mod chat;
mod combat;
mod items;
mod movement;
mod status;
mod trade;

pub use account::{login, register};
pub use status::npc_table;

use std::sync::Arc;

use swi_shared::{NpcKind, ResponseStatus, ServerEvent};

use crate::combat::AttackKind;
use crate::entities::player::{send_inventory, send_stats};
use crate::entities::Entity;
use crate::error::GameError;
use crate::world::World;

/// Result of executing a command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub status: ResponseStatus,
    /// Lines shown to the requester, none for commands that answer through events
    pub messages: Vec<String>,
    /// Send a fresh stats snapshot after the messages
    pub stats_update: bool,
    /// Send a fresh inventory snapshot after the messages
    pub inventory_update: bool,
}

impl CommandResult {
    fn with_status(status: ResponseStatus, messages: Vec<String>) -> Self {
        Self {
            status,
            messages,
            stats_update: false,
            inventory_update: false,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Success, vec![message.into()])
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Normal, vec![message.into()])
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Failure, vec![message.into()])
    }

    pub fn lines(messages: Vec<String>) -> Self {
        Self::with_status(ResponseStatus::Normal, messages)
    }

    /// Nothing to say, the command already answered through events
    pub fn silent() -> Self {
        Self::with_status(ResponseStatus::Normal, Vec::new())
    }

    pub fn with_stats_update(mut self) -> Self {
        self.stats_update = true;
        self
    }

    pub fn with_inventory_update(mut self) -> Self {
        self.inventory_update = true;
        self
    }

    /// The message lines as one event, if there are any
    pub fn to_event(&self) -> Option<ServerEvent> {
        (!self.messages.is_empty()).then(|| ServerEvent::Generic {
            status: self.status,
            messages: self.messages.clone(),
        })
    }

    /// Sends the result to `player`
    pub fn deliver(self, world: &World, player: &Entity) {
        if let Some(event) = self.to_event() {
            player.send(event);
        }
        if self.stats_update {
            send_stats(player);
        }
        if self.inventory_update {
            send_inventory(player, world.templates());
        }
    }
}

impl From<GameError> for CommandResult {
    fn from(e: GameError) -> Self {
        Self::error(e.to_string())
    }
}

type Handled = Result<CommandResult, GameError>;

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    /// Lower-cased key without the slash, aliases resolved
    pub name: String,
    pub args: Vec<&'a str>,
}

/// Splits a line on whitespace and lower-cases the key. Returns `None` for
/// anything that is not a slash command.
pub fn parse(line: &str) -> Option<Command<'_>> {
    let mut parts = line.trim().strip_prefix('/')?.split_whitespace();
    let key = parts.next()?.to_lowercase();
    let args: Vec<&str> = parts.collect();

    let name = match key.as_str() {
        "get" | "p" => "pickup".to_string(),
        "w" => "pm".to_string(),
        "h" => "help".to_string(),
        "s" => "say".to_string(),
        "g" => "global".to_string(),
        "m" => "move".to_string(),
        "r" => "refresh".to_string(),
        "b" => "buy".to_string(),
        "a" => "aim".to_string(),
        _ => key,
    };
    Some(Command { name, args })
}

fn arg<'a>(args: &[&'a str], index: usize, usage: &'static str) -> Result<&'a str, GameError> {
    args.get(index).copied().ok_or(GameError::Usage(usage))
}

/// A positive whole number
fn amount(args: &[&str], index: usize, usage: &'static str) -> Result<u32, GameError> {
    arg(args, index, usage)?
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or(GameError::Usage(usage))
}

fn number<T: std::str::FromStr>(args: &[&str], index: usize, usage: &'static str) -> Result<T, GameError> {
    arg(args, index, usage)?.parse().map_err(|_| GameError::Usage(usage))
}

/// Parse and execute one line from a player who is in the world
pub async fn parse_and_execute(world: &World, player: &Arc<Entity>, line: &str) -> CommandResult {
    let Some(command) = parse(line) else {
        return GameError::UnknownCommand.into();
    };
    dispatch(world, player, &command)
        .await
        .unwrap_or_else(CommandResult::from)
}

async fn dispatch(world: &World, player: &Arc<Entity>, command: &Command<'_>) -> Handled {
    let args = command.args.as_slice();
    match command.name.as_str() {
        "help" => Ok(help(is_admin(player))),
        "here" => buildings::here(player),
        "refresh" => status::refresh(player).await,
        "npcs" => Ok(npc_table(world.templates())),

        // Movement and combat
        "move" => movement::step(world, player, arg(args, 0, "/move <direction>")?),
        "aim" => combat::aim(world, player, arg(args, 0, "/aim <name>")?).await,
        "unaim" => combat::unaim(player),
        "punch" => combat::attack(world, player, AttackKind::Punch),
        "strike" => combat::attack(world, player, AttackKind::Strike),
        "shoot" => combat::attack(world, player, AttackKind::Shoot),
        "autoattack" => combat::toggle_auto_attack(player),
        "flee" => combat::flee(world, player, arg(args, 0, "/flee <direction>")?),

        // Items
        "pickup" => items::pickup(player, arg(args, 0, "/pickup <id|name>")?),
        "drop" => items::drop_item(world, player, arg(args, 0, "/drop <id>")?),
        "equip" => items::equip(world, player, arg(args, 0, "/equip <id>")?),
        "unequip" => items::unequip(world, player, arg(args, 0, "/unequip <id>")?),
        "use" => items::use_item(world, player, arg(args, 0, "/use <id>")?).await,
        "info" => items::info(world, player, arg(args, 0, "/info <id>")?),

        // Chat
        "say" => chat::say(player, args),
        "global" => chat::global(world, player, args),
        "pm" => chat::private(world, player, args).await,

        // Drug trade
        "buy" => trade::browse(world, player, NpcKind::DrugDealer, args.first().copied()).await,
        "sell" => trade::browse(world, player, NpcKind::DrugAddict, args.first().copied()).await,
        "purchase" => trade::purchase(
            world,
            player,
            number(args, 0, "/purchase <npc id> <slot>")?,
            number(args, 1, "/purchase <npc id> <slot>")?,
        ),
        "selldrug" => trade::sell_drug(
            world,
            player,
            number(args, 0, "/selldrug <npc id> <slot>")?,
            number(args, 1, "/selldrug <npc id> <slot>")?,
        ),
        "closetrade" => trade::close(player),

        // Buildings
        "shop" => buildings::shop(world, player, args.first().copied()),
        "shopbuy" => buildings::shop_buy(
            world,
            player,
            number(args, 0, "/shopbuy <building id> <index>")?,
            number(args, 1, "/shopbuy <building id> <index>")?,
        ),
        "shopsell" => buildings::shop_sell(
            world,
            player,
            number(args, 0, "/shopsell <building id> <slot>")?,
            number(args, 1, "/shopsell <building id> <slot>")?,
        ),
        "deposit" => buildings::deposit(player, amount(args, 0, "/deposit <amount>")?),
        "withdraw" => buildings::withdraw(player, amount(args, 0, "/withdraw <amount>")?),
        "transfer" => {
            let to = arg(args, 0, "/transfer <name> <amount>")?;
            let sum = amount(args, 1, "/transfer <name> <amount>")?;
            buildings::transfer(world, player, to, sum).await
        }
        "heal" => buildings::heal(player, amount(args, 0, "/heal <points>")?),
        "drink" => buildings::drink(player, amount(args, 0, "/drink <rounds>")?),
        "travel" => match args.first() {
            Some(code) => buildings::travel(world, player, code),
            None => buildings::destinations(world),
        },

        // Admin
        "news" | "save" | "restock" | "demand" if !is_admin(player) => Err(GameError::NotAdmin),
        "news" => chat::news(world, player, args),
        "save" => admin::save(world, player).await,
        "restock" => admin::restock(world, player).await,
        "demand" => admin::demand(world, player),

        "login" | "register" => Err(GameError::rejected("You are already logged in.")),
        _ => Err(GameError::UnknownCommand),
    }
}

fn is_admin(player: &Entity) -> bool {
    player.lock().player.as_ref().is_some_and(|p| p.admin)
}

const HELP: &[(&str, &str)] = &[
    ("/move <dir>", "Walk north, south, east or west (/m)"),
    ("/here", "What can be done in this place"),
    ("/refresh", "Redraw the game frame (/r)"),
    ("/npcs", "Stats of every kind of NPC"),
    ("/aim <name>", "Take aim on someone here (/a)"),
    ("/unaim", "Lower your aim"),
    ("/punch /strike /shoot", "Attack your target"),
    ("/autoattack", "Keep attacking with your last attack"),
    ("/flee <dir>", "Run, dropping some of what you carry"),
    ("/pickup <id|name>", "Pick an item up from the ground (/get /p)"),
    ("/drop <id>", "Drop an item"),
    ("/equip <id>", "Equip a weapon, ammo or armor"),
    ("/unequip <id>", "Unequip an item"),
    ("/use <id>", "Use an item"),
    ("/info <id>", "Inspect an item"),
    ("/say <msg>", "Talk to everyone here (/s)"),
    ("/global <msg>", "Talk to everyone online (/g)"),
    ("/pm <name> <msg>", "Private message (/w)"),
    ("/buy [name]", "See what a drug dealer has (/b)"),
    ("/sell [name]", "See what a druggie will pay"),
    ("/purchase <npc id> <slot>", "Buy from a dealer"),
    ("/selldrug <npc id> <slot>", "Sell to a druggie"),
    ("/closetrade", "Walk away from every trade"),
    ("/shop [name]", "See a shop's stock"),
    ("/shopbuy <building id> <index>", "Buy from a shop"),
    ("/shopsell <building id> <slot>", "Sell to a shop"),
    ("/deposit /withdraw <n>", "Bank your cash, away from home"),
    ("/transfer <name> <n>", "Send bank money to another player"),
    ("/heal <n>", "Pay the hospital for health"),
    ("/drink <n>", "Buy rounds at the bar for reputation"),
    ("/travel [city]", "Fly to another city"),
];

/// Commands accepted before login
pub const LOGIN_HELP: &[&str] = &[
    "/login <username> <password>",
    "/register <username> <password> <hometown>",
    "/help",
    "/npcs",
    "/refresh",
];

fn help(is_admin: bool) -> CommandResult {
    let mut lines = vec!["Available commands:".to_string()];
    lines.extend(HELP.iter().map(|(usage, what)| format!("  {} - {}", usage, what)));
    if is_admin {
        lines.push("Admin commands:".to_string());
        lines.push("  /news <msg> - Send a news flash to everyone".to_string());
        lines.push("  /save - Save every online player".to_string());
        lines.push("  /restock - Restock dealers and empty addicts everywhere".to_string());
        lines.push("  /demand - Re-roll drug demand in this city".to_string());
    }
    CommandResult::lines(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::test_player;
    use crate::world::tests::{put_at, test_world};
    use swi_shared::Coordinates;

    #[test]
    fn keys_are_lower_cased_and_aliases_resolved() {
        let command = parse("  /SAY hello   there ").unwrap();
        assert_eq!(command.name, "say");
        assert_eq!(command.args, vec!["hello", "there"]);

        let command = parse("/M north").unwrap();
        assert_eq!(command.name, "move");
        assert_eq!(command.args, vec!["north"]);

        let command = parse("/w bob hi").unwrap();
        assert_eq!(command.name, "pm");
        assert_eq!(command.args, vec!["bob", "hi"]);

        for (alias, name) in [
            ("/get", "pickup"),
            ("/p", "pickup"),
            ("/h", "help"),
            ("/s", "say"),
            ("/g", "global"),
            ("/r", "refresh"),
            ("/b", "buy"),
        ] {
            assert_eq!(parse(alias).unwrap().name, name);
        }

        let command = parse("/a bob").unwrap();
        assert_eq!(command.name, "aim");
        assert_eq!(command.args, vec!["bob"]);

        assert!(parse("hello").is_none());
        assert!(parse("/").is_none());
    }

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(amount(&["12"], 0, "/heal <points>"), Ok(12));
        assert_eq!(amount(&["0"], 0, "/heal <points>"), Err(GameError::Usage("/heal <points>")));
        assert_eq!(amount(&["-3"], 0, "/heal <points>"), Err(GameError::Usage("/heal <points>")));
        assert_eq!(amount(&[], 0, "/heal <points>"), Err(GameError::Usage("/heal <points>")));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_and_admin_commands_are_rejected() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(1, 1)).await;

        let result = parse_and_execute(&world, &alice, "/dance").await;
        assert_eq!(result, CommandResult::error("Unknown command, try /help"));
        let result = parse_and_execute(&world, &alice, "/news hello").await;
        assert_eq!(result, CommandResult::error("This command requires admin privileges"));
        let result = parse_and_execute(&world, &alice, "/heal").await;
        assert_eq!(result, CommandResult::error("Usage: /heal <points>"));
        world.shutdown();
    }
}
