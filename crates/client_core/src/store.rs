use shared::domain::{GameHandle, PlayerIdentity};

/// Identifiers established by a successful join. A new join overwrites any
/// values left behind by a missed reset.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    identity: Option<PlayerIdentity>,
    game: Option<GameHandle>,
}

impl SessionStore {
    pub fn set(&mut self, identity: PlayerIdentity, game: GameHandle) {
        self.identity = Some(identity);
        self.game = Some(game);
    }

    pub fn identity(&self) -> Option<&PlayerIdentity> {
        self.identity.as_ref()
    }

    pub fn game(&self) -> Option<&GameHandle> {
        self.game.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.identity.is_some() && self.game.is_some()
    }

    pub fn clear(&mut self) {
        self.identity = None;
        self.game = None;
    }
}
