//! Everything wired together, for a host that drives it from its tick loop.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::capability::CapabilityKind;
use crate::chests::{ChestKind, ChestPool};
use crate::client::{ClientError, ConnectTarget, ProtocolClient, SessionStatus};
use crate::config::BridgeConfig;
use crate::enforcer::{Enforcer, UpgradeDecision, UpgradeGate};
use crate::host::HostAdapter;
use crate::host_queue::HostQueue;
use crate::items::ItemApplier;
use crate::players::{PlayerId, PlayerSessions};
use crate::registry::{Registry, CHEST_BASE, MAX_CHEST_CHECKS};
use crate::rng::Rng64;
use crate::tracker::{PollOutcome, ProgressionTracker};
use crate::unlocks::{UnlockObserver, UnlockStore};

pub struct Bridge {
    config: BridgeConfig,
    config_path: Option<PathBuf>,
    registry: Arc<Registry>,
    unlocks: Arc<UnlockStore>,
    enforcer: Arc<Enforcer>,
    client: ProtocolClient,
    tracker: ProgressionTracker,
    queue: HostQueue,
    chests: ChestPool,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_rng(config, Rng64::from_entropy())
    }

    pub fn with_rng(config: BridgeConfig, mut rng: Rng64) -> Self {
        let queue = HostQueue::new();
        let registry = Arc::new(Registry::new());
        let unlocks = Arc::new(UnlockStore::new());
        unlocks.set_debug_bypass(config.debug_bypass);
        let sessions = Arc::new(PlayerSessions::new());
        let enforcer = Arc::new(Enforcer::new(unlocks.clone(), sessions.clone()));

        let items = Arc::new(ItemApplier::with_rng(
            unlocks.clone(),
            Rng64::from_seed(rng.next_u64()),
        ));
        let client = ProtocolClient::new(queue.handle(), items);
        let tracker = ProgressionTracker::new(
            registry.clone(),
            sessions,
            enforcer.clone(),
            Arc::new(client.clone()),
        )
        .interval_ticks(config.poll_interval_ticks);

        Self {
            config,
            config_path: None,
            registry,
            unlocks,
            enforcer,
            client,
            tracker,
            queue,
            chests: ChestPool::new(rng),
        }
    }

    /// Persist connection settings here whenever they change.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn unlocks(&self) -> &Arc<UnlockStore> {
        &self.unlocks
    }

    pub fn client(&self) -> &ProtocolClient {
        &self.client
    }

    pub fn set_observer(&self, observer: Arc<dyn UnlockObserver>) {
        self.unlocks.set_observer(observer);
    }

    /// The pre-upgrade callback to register with the host.
    pub fn upgrade_gate(&self) -> Arc<dyn UpgradeGate> {
        self.enforcer.clone()
    }

    pub fn before_upgrade(
        &self,
        host: &mut dyn HostAdapter,
        player: PlayerId,
        kind: CapabilityKind,
        name: &str,
    ) -> UpgradeDecision {
        self.enforcer.authorize_upgrade(host, player, kind, name)
    }

    /// Call once per host tick, on the host thread.
    pub fn on_tick(&mut self, host: &mut dyn HostAdapter) -> Option<Vec<PollOutcome>> {
        self.queue.run_pending(host);
        self.tracker.on_tick(host)
    }

    /// Drain network work and poll immediately, ignoring the cadence.
    pub fn poll_now(&mut self, host: &mut dyn HostAdapter) -> Vec<PollOutcome> {
        self.queue.run_pending(host);
        self.tracker.poll_all(host)
    }

    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        slot_name: &str,
        password: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut next = self.config.clone();
        next.host = host.trim().to_string();
        next.port = port;
        next.slot_name = slot_name.trim().to_string();
        next.password = password.unwrap_or_default().to_string();
        if !next.has_connection_info() {
            return Err(ClientError::MissingConnectionInfo);
        }
        self.client.connect(next.target())?;

        if next != self.config {
            self.config = next;
            self.persist();
        }
        Ok(())
    }

    /// Connect with the saved settings.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        if !self.config.has_connection_info() {
            return Err(ClientError::MissingConnectionInfo);
        }
        self.client.connect(self.config.target())
    }

    /// Startup hook. True if a connection attempt was started.
    pub fn auto_connect(&self) -> bool {
        if !self.config.auto_connect || !self.config.has_connection_info() {
            return false;
        }
        match self.reconnect() {
            Ok(()) => true,
            Err(e) => {
                warn!(err=%e, "auto-connect failed");
                false
            }
        }
    }

    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.client.disconnect()
    }

    pub fn status(&self) -> SessionStatus {
        self.client.status()
    }

    pub fn target(&self) -> ConnectTarget {
        self.config.target()
    }

    pub fn set_debug_bypass(&mut self, on: bool) {
        self.unlocks.set_debug_bypass(on);
        self.config.debug_bypass = on;
    }

    pub fn on_player_logout(&mut self, player: PlayerId) {
        self.tracker.on_logout(player);
        if self.config.clear_unlocks_on_logout {
            self.unlocks.clear(player);
        }
        info!(player=%player, "player left; session state dropped");
    }

    pub fn on_quest_completed(&mut self, player: PlayerId) -> Option<i64> {
        self.tracker.on_quest_completed(player)
    }

    pub fn on_collectible_found(&self, player: PlayerId, name: &str) -> Option<i64> {
        self.tracker.on_collectible_found(player, name)
    }

    pub fn on_vault_completed(&self, player: PlayerId, total: u32) -> Vec<i64> {
        self.tracker.on_vault_completed(player, total)
    }

    /// A vault chest was opened. Returns the chest check its loot should
    /// carry, if the roll awards one.
    pub fn on_chest_opened(&mut self, player: PlayerId, kind: ChestKind) -> Option<i64> {
        let options = self.client.slot_options();
        let id = self.chests.roll(&options, kind)?;
        info!(player=%player, kind=?kind, location = id, "chest check spawned");
        Some(id)
    }

    /// The player picked up a chest check token.
    pub fn redeem_chest_check(&mut self, player: PlayerId, location_id: i64) -> bool {
        if !(CHEST_BASE..CHEST_BASE + i64::from(MAX_CHEST_CHECKS)).contains(&location_id) {
            warn!(player=%player, location = location_id, "not a chest check");
            return false;
        }
        self.chests.mark_found(location_id);
        info!(player=%player, location = location_id, "chest check redeemed");
        self.client.send_location_check(location_id)
    }

    fn persist(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = self.config.save(path) {
            warn!(path=?path, err=%e, "failed to save connection settings");
        }
    }
}
