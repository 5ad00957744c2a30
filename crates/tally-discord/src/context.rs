//! State shared by the event handler and every command.

use std::sync::OnceLock;

use tally_collector::{EventHub, HandlerFailure};
use tally_core::{ActorId, TallyConfig};
use tally_store::ResultStore;
use tokio::sync::mpsc;

use crate::mojang::MojangClient;

pub struct BotContext {
    pub config: TallyConfig,
    pub hub: EventHub,
    pub store: ResultStore,
    pub mojang: MojangClient,
    /// Collector failures go here; the reporter task drains them.
    pub failures: mpsc::UnboundedSender<HandlerFailure>,
    /// Set once the gateway reports `ready`.
    pub bot_id: OnceLock<ActorId>,
}

impl BotContext {
    pub fn new(
        config: TallyConfig,
        store: ResultStore,
        failures: mpsc::UnboundedSender<HandlerFailure>,
    ) -> crate::error::Result<Self> {
        let mojang = MojangClient::new(&config.mojang)?;
        Ok(Self {
            config,
            hub: EventHub::new(),
            store,
            mojang,
            failures,
            bot_id: OnceLock::new(),
        })
    }

    pub fn is_self(&self, actor: ActorId) -> bool {
        self.bot_id.get() == Some(&actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_itself_once_ready() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = ResultStore::open_in_memory().unwrap();
        let app = BotContext::new(TallyConfig::default(), store, tx).unwrap();

        assert!(!app.is_self(ActorId(7)));
        app.bot_id.set(ActorId(7)).unwrap();
        assert!(app.is_self(ActorId(7)));
        assert!(!app.is_self(ActorId(8)));
    }
}
