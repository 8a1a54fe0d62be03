//! Commands accepted before a session is in the world.

use std::sync::Arc;

use log::{info, warn};

use super::CommandResult;
use crate::entities::Entity;
use crate::error::AuthError;
use crate::session::Session;
use crate::world::World;

const LOGIN_USAGE: &str = "Usage: /login <username> <password>";
const REGISTER_USAGE: &str = "Usage: /register <username> <password> <hometown>";

/// Authenticates and brings the character into the world
pub async fn login(world: &World, session: Arc<dyn Session>, args: &[&str]) -> Result<Arc<Entity>, CommandResult> {
    let [username, password] = args else {
        return Err(CommandResult::error(LOGIN_USAGE));
    };
    let user_id = world
        .persistence()
        .authenticate(username, password)
        .await
        .map_err(|e| {
            warn!("Failed login for '{}': {}", username, e);
            CommandResult::error(e.to_string())
        })?;
    world
        .login(user_id, session)
        .await
        .map_err(CommandResult::from)
}

/// Creates an account with a character in `hometown`, then logs it in
pub async fn register(world: &World, session: Arc<dyn Session>, args: &[&str]) -> Result<Arc<Entity>, CommandResult> {
    let [username, password, hometown] = args else {
        return Err(CommandResult::error(REGISTER_USAGE));
    };
    let city = world
        .region(hometown)
        .map(|r| r.code().to_string())
        .ok_or_else(|| CommandResult::error(AuthError::UnknownCity(hometown.to_string()).to_string()))?;
    let user_id = world
        .persistence()
        .register(username, password, &city)
        .await
        .map_err(|e| CommandResult::error(e.to_string()))?;
    info!("Registered '{}' (user {}) from {}", username, user_id, city);
    world
        .login(user_id, session)
        .await
        .map_err(CommandResult::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Persistence;
    use crate::session::tests::RecordingSession;

    fn session() -> Arc<dyn Session> {
        Arc::new(RecordingSession::new())
    }

    #[tokio::test(start_paused = true)]
    async fn register_puts_the_character_at_the_home_airport() {
        let (world, _) = crate::world::tests::test_world(0.0);
        let player = register(&world, session(), &["Alice", "secret1", "ew"]).await.unwrap();
        crate::world::tests::settle().await;
        let place = player.location().unwrap();
        assert_eq!(place.region_code(), "EW");
        assert_eq!(player.lock().player.as_ref().unwrap().hometown, "EW");
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn register_rejects_unknown_cities_and_bad_usage() {
        let (world, _) = crate::world::tests::test_world(0.0);
        assert_eq!(
            register(&world, session(), &["Alice", "secret1", "XX"]).await.err(),
            Some(CommandResult::error("Unknown city 'XX'"))
        );
        assert_eq!(
            register(&world, session(), &["Alice"]).await.err(),
            Some(CommandResult::error(REGISTER_USAGE))
        );
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn login_checks_the_password_and_refuses_a_second_session() {
        let (world, store) = crate::world::tests::test_world(0.0);
        store.register("Alice", "secret1", "TV").await.unwrap();

        assert_eq!(
            login(&world, session(), &["alice", "nope123"]).await.err(),
            Some(CommandResult::error("Invalid username or password"))
        );
        let alice = login(&world, session(), &["alice", "secret1"]).await.unwrap();
        assert_eq!(alice.name, "Alice");
        assert!(login(&world, session(), &["alice", "secret1"]).await.is_err());
        world.shutdown();
    }
}
