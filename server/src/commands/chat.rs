use std::sync::Arc;

use log::info;

use swi_shared::{ChatType, ServerEvent};

use super::{CommandResult, Handled};
use crate::entities::Entity;
use crate::error::GameError;
use crate::world::World;

/// Joins the words back together. Splitting already collapsed newlines and runs of spaces.
fn message(words: &[&str], usage: &'static str) -> Result<String, GameError> {
    let text = words.join(" ");
    let text = text.trim();
    if text.is_empty() {
        return Err(GameError::Usage(usage));
    }
    Ok(text.to_string())
}

fn chat(chat_type: ChatType, sender: &Entity, message: String) -> ServerEvent {
    ServerEvent::Chat {
        chat_type,
        sender: sender.name.clone(),
        message,
    }
}

/// Everyone at the speaker's Place, the speaker included
pub(super) fn say(player: &Entity, words: &[&str]) -> Handled {
    let text = message(words, "/say <message>")?;
    let place = player.location().ok_or(GameError::InTransit)?;
    info!(target: "chat", "[{} {}] {}: {}", place.region_code(), place.coords(), player.name, text);
    place.broadcast(chat(ChatType::Local, player, text), &[]);
    Ok(CommandResult::silent())
}

pub(super) fn global(world: &World, player: &Entity, words: &[&str]) -> Handled {
    let text = message(words, "/global <message>")?;
    info!(target: "chat", "[global] {}: {}", player.name, text);
    world.broadcast_global(chat(ChatType::Global, player, text));
    Ok(CommandResult::silent())
}

pub(super) async fn private(world: &World, player: &Arc<Entity>, words: &[&str]) -> Handled {
    const USAGE: &str = "/pm <name> <message>";
    let (name, rest) = words.split_first().ok_or(GameError::Usage(USAGE))?;
    let text = message(rest, USAGE)?;
    let recipient = world
        .find_player(name)
        .await
        .ok_or_else(|| GameError::rejected("There are no one online going by that name."))?;

    info!(target: "chat", "[pm] {} -> {}: {}", player.name, recipient.name, text);
    let event = chat(ChatType::Private, player, text);
    if recipient.id != player.id {
        recipient.send(event.clone());
    }
    player.send(event);
    Ok(CommandResult::silent())
}

pub(super) fn news(world: &World, player: &Entity, words: &[&str]) -> Handled {
    let text = message(words, "/news <message>")?;
    info!("{} sent a news flash: {}", player.name, text);
    world.broadcast_global(ServerEvent::NewsFlash { message: text });
    Ok(CommandResult::silent())
}
