//! Connection to the randomizer server.
//!
//! One `ProtocolClient` per process. The socket runs on a background task;
//! every inbound frame goes through a channel to a single dispatch loop, and
//! anything that touches game state is posted to the host thread through the
//! [`HostHandle`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use apio::SegmentAssembler;
use approto::{decode_batch, encode_batch, ClientCommand, Inbound, NetworkItem, ServerCommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::checks::{wire_ids, CheckLedger, GoalState};
use crate::host::{HostAdapter, Notice};
use crate::host_queue::HostHandle;
use crate::items::ItemApplier;
use crate::rng::random_128;
use crate::tracker::ProgressSink;

pub const GAME_NAME: &str = "Vault Hunters";
pub const DEFAULT_GOAL_LEVEL: u32 = 100;

const OUTBOUND_QUEUE: usize = 256;
const INBOUND_QUEUE: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connecting => "Connecting",
            SessionState::Connected => "Connected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-seed settings from `Connected.slot_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotOptions {
    pub goal_level: u32,
    pub vault_chest_checks: u32,
    pub wooden_chest_weight: f32,
    pub normal_chest_weight: f32,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            goal_level: DEFAULT_GOAL_LEVEL,
            vault_chest_checks: 0,
            wooden_chest_weight: 0.0,
            normal_chest_weight: 0.0,
        }
    }
}

impl SlotOptions {
    /// Missing or mistyped fields keep their defaults.
    pub fn from_slot_data(v: &Value) -> Self {
        let mut o = Self::default();
        let uint = |key: &str| {
            v.get(key)
                .and_then(Value::as_u64)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        };
        let weight = |key: &str| {
            v.get(key)
                .and_then(Value::as_f64)
                .map(|w| (w as f32).clamp(0.0, 1.0))
        };
        if let Some(n) = uint("goal_level") {
            o.goal_level = n;
        }
        if let Some(n) = uint("vault_chest_checks") {
            o.vault_chest_checks = n;
        }
        if let Some(w) = weight("wooden_chest_weight") {
            o.wooden_chest_weight = w;
        }
        if let Some(w) = weight("normal_chest_weight") {
            o.normal_chest_weight = w;
        }
        o
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub url: String,
    pub slot_name: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A connection is already open or opening.
    Busy(SessionState),
    NotConnected,
    NoRuntime,
    /// Host, port or slot name is missing.
    MissingConnectionInfo,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Busy(s) => write!(f, "already {}", s.as_str().to_ascii_lowercase()),
            ClientError::NotConnected => write!(f, "not connected"),
            ClientError::NoRuntime => write!(f, "no async runtime available"),
            ClientError::MissingConnectionInfo => write!(f, "host, port and slot name are required"),
        }
    }
}

impl std::error::Error for ClientError {}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub url: Option<String>,
    pub slot_name: Option<String>,
    pub slot: Option<i64>,
    pub team: Option<i64>,
    pub goal_level: u32,
    pub goal: GoalState,
    pub last_error: Option<String>,
    pub checks_sent: usize,
    pub checks_pending: usize,
    pub items_received: usize,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Archipelago: {}", self.state)?;
        if let (Some(slot), Some(team)) = (self.slot, self.team) {
            write!(f, " (slot {slot}, team {team})")?;
        }
        if let (Some(url), Some(name)) = (&self.url, &self.slot_name) {
            write!(f, "\nServer: {url} as {name}")?;
        }
        write!(f, "\nGoal level: {}", self.goal_level)?;
        if self.goal != GoalState::NotReached {
            write!(f, " (reached)")?;
        }
        write!(
            f,
            "\nChecks sent: {} ({} pending)\nItems received: {}",
            self.checks_sent, self.checks_pending, self.items_received
        )?;
        if let Some(e) = &self.last_error {
            write!(f, "\nLast error: {e}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct ClientState {
    session: SessionState,
    /// Bumped per connection attempt so a stale socket task can't tear down
    /// a newer one.
    generation: u64,
    target: Option<ConnectTarget>,
    slot: Option<i64>,
    team: Option<i64>,
    options: SlotOptions,
    last_error: Option<String>,
    outbound: Option<mpsc::Sender<Outbound>>,
    shutdown: Option<watch::Sender<bool>>,
    ledger: CheckLedger,
    received: HashSet<(i64, i64)>,
}

struct ClientInner {
    state: Mutex<ClientState>,
    host: HostHandle,
    items: Arc<ItemApplier>,
}

struct Segment {
    data: Vec<u8>,
    last: bool,
}

/// One frame for the socket, with the ledger entries it settles once written.
pub(crate) struct Outbound {
    frame: String,
    locations: Vec<i64>,
    goal: bool,
}

#[derive(Clone)]
pub struct ProtocolClient {
    inner: Arc<ClientInner>,
}

impl ProtocolClient {
    pub fn new(host: HostHandle, items: Arc<ItemApplier>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                state: Mutex::new(ClientState::default()),
                host,
                items,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start a connection attempt on the current tokio runtime.
    pub fn connect(&self, target: ConnectTarget) -> Result<(), ClientError> {
        let rt = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (stop_tx, stop_rx) = watch::channel(false);

        let generation = {
            let mut st = self.lock();
            if st.session != SessionState::Disconnected {
                return Err(ClientError::Busy(st.session));
            }
            st.session = SessionState::Connecting;
            st.generation += 1;
            st.target = Some(target.clone());
            st.last_error = None;
            st.slot = None;
            st.team = None;
            st.outbound = Some(out_tx);
            st.shutdown = Some(stop_tx);
            st.generation
        };

        info!(url=%target.url, slot=%target.slot_name, "connecting");
        let client = self.clone();
        rt.spawn(async move {
            client
                .run_connection(generation, target, out_rx, stop_rx)
                .await;
        });
        Ok(())
    }

    pub fn disconnect(&self) -> Result<(), ClientError> {
        let was_connected = {
            let mut st = self.lock();
            if st.session == SessionState::Disconnected {
                return Err(ClientError::NotConnected);
            }
            let was = st.session == SessionState::Connected;
            drop_transport(&mut st);
            was
        };
        info!("disconnected by request");
        if was_connected {
            self.announce_disconnect();
        }
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.lock().session
    }

    pub fn status(&self) -> SessionStatus {
        let st = self.lock();
        SessionStatus {
            state: st.session,
            url: st.target.as_ref().map(|t| t.url.clone()),
            slot_name: st.target.as_ref().map(|t| t.slot_name.clone()),
            slot: st.slot,
            team: st.team,
            goal_level: st.options.goal_level,
            goal: st.ledger.goal(),
            last_error: st.last_error.clone(),
            checks_sent: st.ledger.sent_count(),
            checks_pending: st.ledger.pending_count(),
            items_received: st.received.len(),
        }
    }

    pub fn slot_options(&self) -> SlotOptions {
        self.lock().options.clone()
    }

    pub fn is_checked(&self, location_id: i64) -> bool {
        self.lock().ledger.is_checked(location_id)
    }

    /// Mark `location_id` reached. Safe to call repeatedly; the id goes out
    /// at most once. Returns false if it was already known.
    pub fn send_location_check(&self, location_id: i64) -> bool {
        let mut st = self.lock();
        if !st.ledger.record(location_id) {
            debug!(location = location_id, "location already checked");
            return false;
        }
        if st.session == SessionState::Connected {
            flush_locked(&mut st);
        } else {
            warn!(location = location_id, state=%st.session, "not connected; check queued");
        }
        true
    }

    /// Report the goal. Only the first call does anything.
    pub fn send_goal_completion(&self) -> bool {
        let mut st = self.lock();
        if !st.ledger.reach_goal() {
            return false;
        }
        info!("goal reached");
        if st.session == SessionState::Connected {
            flush_locked(&mut st);
        } else {
            warn!(state=%st.session, "not connected; goal completion queued");
        }
        true
    }

    /// Dispatch one complete inbound message. Returns how many commands were
    /// handled.
    pub fn handle_text(&self, text: &str) -> usize {
        let batch = match decode_batch(text) {
            Ok(b) => b,
            Err(e) => {
                warn!(err=%e, "dropping unparseable message");
                return 0;
            }
        };
        let mut handled = 0;
        for el in batch {
            match el {
                Ok(Inbound::Command(cmd)) => {
                    self.dispatch(cmd);
                    handled += 1;
                }
                Ok(Inbound::Unhandled(name)) => debug!(cmd=%name, "ignoring unhandled command"),
                Err(e) => warn!(err=%e, "skipping bad command"),
            }
        }
        handled
    }

    fn dispatch(&self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connected {
                slot,
                team,
                slot_data,
            } => self.on_connected(slot, team, &slot_data),
            ServerCommand::ReceivedItems { index, items } => self.on_received_items(index, items),
            ServerCommand::ConnectionRefused { .. } => {
                let reason = cmd
                    .refusal_reason()
                    .unwrap_or_else(|| "Unknown".to_string());
                self.on_refused(reason);
            }
            ServerCommand::Print { .. } | ServerCommand::PrintJson { .. } => {
                if let Some(text) = cmd.display_text() {
                    self.relay(text);
                }
            }
            ServerCommand::RoomInfo { seed_name } => {
                debug!(seed = seed_name.as_deref().unwrap_or("?"), "room info");
            }
            ServerCommand::LocationInfo { locations } => {
                debug!(count = locations.len(), "location info");
            }
            ServerCommand::Retrieved {} | ServerCommand::SetReply {} | ServerCommand::Bounced {} => {
                debug!("ignoring data-storage reply");
            }
        }
    }

    fn on_connected(&self, slot: i64, team: i64, slot_data: &Value) {
        let options = SlotOptions::from_slot_data(slot_data);
        let slot_name = {
            let mut st = self.lock();
            if st.session == SessionState::Disconnected {
                debug!("Connected after teardown; ignoring");
                return;
            }
            st.session = SessionState::Connected;
            st.slot = Some(slot);
            st.team = Some(team);
            st.options = options.clone();
            flush_locked(&mut st);
            st.target
                .as_ref()
                .map(|t| t.slot_name.clone())
                .unwrap_or_default()
        };

        info!(
            slot,
            team,
            slot_name=%slot_name,
            goal_level = options.goal_level,
            chest_checks = options.vault_chest_checks,
            "connected"
        );
        self.inner
            .host
            .submit(move |host| host.notify_all(&Notice::Connected { slot_name }));
    }

    fn on_received_items(&self, index: i64, items: Vec<NetworkItem>) {
        let total = items.len();
        let fresh: Vec<NetworkItem> = {
            let mut st = self.lock();
            items
                .into_iter()
                .filter(|it| st.received.insert((it.item, it.location)))
                .collect()
        };
        if fresh.len() < total {
            debug!(index, dupes = total - fresh.len(), "skipping duplicate item deliveries");
        }
        if fresh.is_empty() {
            return;
        }

        let client = self.clone();
        let queued = fresh.clone();
        if !self
            .inner
            .host
            .submit(move |host| client.apply_items(host, queued))
        {
            warn!(count = fresh.len(), "host queue closed; items left for resend");
            self.release(&fresh);
        }
    }

    /// Runs on the host thread.
    fn apply_items(&self, host: &mut dyn HostAdapter, items: Vec<NetworkItem>) {
        let Some(player) = host.active_player() else {
            warn!(count = items.len(), "no player online; items left for resend");
            self.release(&items);
            return;
        };
        for it in items {
            match self.inner.items.apply(host, player, it.item) {
                Ok(grant) => {
                    info!(player=%player, item = it.item, location = it.location, grant=?grant, "applied item")
                }
                Err(e) => {
                    warn!(player=%player, item = it.item, err=%e, "item application failed")
                }
            }
        }
    }

    fn release(&self, items: &[NetworkItem]) {
        let mut st = self.lock();
        for it in items {
            st.received.remove(&(it.item, it.location));
        }
    }

    fn on_refused(&self, reason: String) {
        warn!(reason=%reason, "connection refused");
        let mut st = self.lock();
        st.last_error = Some(reason);
        drop_transport(&mut st);
    }

    fn relay(&self, text: String) {
        self.inner.host.submit(move |host| {
            if let Some(p) = host.active_player() {
                host.notify(p, &Notice::Relay(text));
            }
        });
    }

    fn announce_disconnect(&self) {
        self.inner
            .host
            .submit(|host| host.notify_all(&Notice::Disconnected));
    }

    fn transport_closed(&self, generation: u64, reason: Option<String>) {
        let was_connected = {
            let mut st = self.lock();
            if st.generation != generation || st.session == SessionState::Disconnected {
                return;
            }
            if let Some(r) = &reason {
                st.last_error = Some(r.clone());
            }
            let was = st.session == SessionState::Connected;
            drop_transport(&mut st);
            was
        };
        match reason {
            Some(r) => warn!(reason=%r, "connection lost"),
            None => info!("connection closed"),
        }
        if was_connected {
            self.announce_disconnect();
        }
    }

    async fn run_connection(
        self,
        generation: u64,
        target: ConnectTarget,
        mut out_rx: mpsc::Receiver<Outbound>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let connected = tokio::select! {
            r = tokio_tungstenite::connect_async(target.url.as_str()) => r,
            _ = stop_rx.changed() => {
                self.transport_closed(generation, None);
                return;
            }
        };
        let ws = match connected {
            Ok((ws, _)) => ws,
            Err(e) => {
                self.transport_closed(generation, Some(format!("connect {}: {e}", target.url)));
                return;
            }
        };
        let (mut sink, mut stream) = ws.split();

        let handshake = ClientCommand::connect(
            GAME_NAME,
            &target.slot_name,
            &client_uuid(),
            target.password.as_deref(),
        );
        let frame = match encode_batch(&[handshake]) {
            Ok(f) => f,
            Err(e) => {
                self.transport_closed(generation, Some(e.to_string()));
                return;
            }
        };
        if let Err(e) = sink.send(Message::Text(frame)).await {
            self.transport_closed(generation, Some(format!("send handshake: {e}")));
            return;
        }
        debug!(slot=%target.slot_name, "sent Connect");

        let (seg_tx, seg_rx) = mpsc::channel::<Segment>(INBOUND_QUEUE);
        let dispatcher = tokio::spawn(self.clone().dispatch_loop(seg_rx));

        let mut unsent = Vec::new();
        let mut reason = loop {
            tokio::select! {
                out = out_rx.recv() => {
                    let Some(out) = out else {
                        break None;
                    };
                    if let Err(e) = sink.send(Message::Text(out.frame.clone())).await {
                        unsent.push(out);
                        break Some(format!("send: {e}"));
                    }
                    self.written(&out);
                }
                m = stream.next() => {
                    let data = match m {
                        None => break Some("connection closed".to_string()),
                        Some(Err(e)) => break Some(format!("transport: {e}")),
                        Some(Ok(Message::Text(s))) => s.into_bytes(),
                        Some(Ok(Message::Binary(b))) => b,
                        Some(Ok(Message::Close(_))) => break Some("closed by server".to_string()),
                        Some(Ok(_)) => continue,
                    };
                    if seg_tx.send(Segment { data, last: true }).await.is_err() {
                        break Some("dispatcher stopped".to_string());
                    }
                }
                _ = stop_rx.changed() => break None,
            }
        };

        // Anything still queued is written before the close, or handed back
        // to the ledger if the socket is gone.
        out_rx.close();
        while let Ok(out) = out_rx.try_recv() {
            if reason.is_none() {
                match sink.send(Message::Text(out.frame.clone())).await {
                    Ok(()) => {
                        self.written(&out);
                        continue;
                    }
                    Err(e) => reason = Some(format!("send: {e}")),
                }
            }
            unsent.push(out);
        }
        if reason.is_none() {
            let _ = sink.send(Message::Close(None)).await;
        }

        // Let everything already read reach the host before tearing down.
        drop(seg_tx);
        let _ = dispatcher.await;
        self.transport_closed(generation, reason);
        for out in &unsent {
            self.unwritten(out);
        }
    }

    /// The socket accepted `out`.
    fn written(&self, out: &Outbound) {
        {
            let mut st = self.lock();
            st.ledger.mark_sent(&out.locations);
            if out.goal {
                st.ledger.mark_goal_sent();
            }
        }
        if !out.locations.is_empty() {
            info!(count = out.locations.len(), "sent location checks");
        }
        if out.goal {
            info!("sent goal completion");
        }
    }

    /// `out` never reached the socket. Its entries go back to pending and
    /// leave with the next connected session.
    fn unwritten(&self, out: &Outbound) {
        warn!(
            count = out.locations.len(),
            goal = out.goal,
            "frame not written; requeued"
        );
        let mut st = self.lock();
        st.ledger.restore(&out.locations);
        if out.goal {
            st.ledger.restore_goal();
        }
        flush_locked(&mut st);
    }

    async fn dispatch_loop(self, mut rx: mpsc::Receiver<Segment>) {
        let mut asm = SegmentAssembler::new();
        while let Some(seg) = rx.recv().await {
            match asm.push(&seg.data, seg.last) {
                Ok(Some(text)) => {
                    self.handle_text(&text);
                }
                Ok(None) => {}
                Err(e) => warn!(err=%e, "dropping inbound message"),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn attach_loopback(&self, target: ConnectTarget) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let mut st = self.lock();
        st.session = SessionState::Connecting;
        st.generation += 1;
        st.target = Some(target);
        st.outbound = Some(tx);
        rx
    }

    /// Play the socket task: write every queued frame and return them.
    #[cfg(test)]
    pub(crate) fn write_queued(&self, rx: &mut mpsc::Receiver<Outbound>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(out) = rx.try_recv() {
            self.written(&out);
            frames.push(out.frame);
        }
        frames
    }
}

impl ProgressSink for ProtocolClient {
    fn location_reached(&self, location_id: i64) {
        self.send_location_check(location_id);
    }

    fn goal_level(&self) -> u32 {
        self.lock().options.goal_level
    }

    fn goal_reached(&self) -> bool {
        self.send_goal_completion()
    }
}

fn drop_transport(st: &mut ClientState) {
    st.session = SessionState::Disconnected;
    st.slot = None;
    st.team = None;
    st.outbound = None;
    if let Some(stop) = st.shutdown.take() {
        let _ = stop.send(true);
    }
}

/// Push pending checks and the goal onto the outbound queue.
///
/// Queued entries stay in flight until the socket task reports the write.
fn flush_locked(st: &mut ClientState) {
    if st.session != SessionState::Connected {
        return;
    }
    let Some(tx) = st.outbound.clone() else {
        return;
    };

    let ids = st.ledger.take_pending();
    if !ids.is_empty() {
        let (fits, oversized) = wire_ids(&ids);
        for id in &oversized {
            warn!(location = *id, "location id does not fit in 32 bits; not sent");
        }
        // Settled either way; an oversized id can never go out.
        st.ledger.mark_sent(&oversized);

        if !fits.is_empty() {
            let local: Vec<i64> = fits.iter().map(|(id, _)| *id).collect();
            let locations: Vec<i32> = fits.iter().map(|(_, w)| *w).collect();
            let queued = encode_batch(&[ClientCommand::LocationChecks { locations }])
                .map_err(|e| e.to_string())
                .and_then(|frame| {
                    tx.try_send(Outbound {
                        frame,
                        locations: local.clone(),
                        goal: false,
                    })
                    .map_err(|e| e.to_string())
                });
            match queued {
                Ok(()) => debug!(count = local.len(), "queued location checks"),
                Err(e) => {
                    warn!(err=%e, count = local.len(), "could not queue location checks");
                    st.ledger.restore(&local);
                }
            }
        }
    }

    if st.ledger.take_goal() {
        let queued = encode_batch(&[ClientCommand::goal_complete()])
            .map_err(|e| e.to_string())
            .and_then(|frame| {
                tx.try_send(Outbound {
                    frame,
                    locations: Vec::new(),
                    goal: true,
                })
                .map_err(|e| e.to_string())
            });
        if let Err(e) = queued {
            warn!(err=%e, "could not queue goal completion");
            st.ledger.restore_goal();
        }
    }
}

/// Random v4 UUID, fresh per connection attempt.
fn client_uuid() -> String {
    let mut b = random_128();
    b[6] = (b[6] & 0x0f) | 0x40;
    b[8] = (b[8] & 0x3f) | 0x80;
    let h: String = b.iter().map(|x| format!("{x:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityKind;
    use crate::host_queue::HostQueue;
    use crate::memory_host::MemoryHost;
    use crate::players::PlayerId;
    use crate::rng::Rng64;
    use crate::unlocks::{UnlockQuery, UnlockStore};
    use std::time::Duration;

    struct Fixture {
        client: ProtocolClient,
        queue: HostQueue,
        unlocks: Arc<UnlockStore>,
        host: MemoryHost,
        p: PlayerId,
    }

    fn fixture() -> Fixture {
        let queue = HostQueue::new();
        let unlocks = Arc::new(UnlockStore::new());
        let items = Arc::new(ItemApplier::with_rng(unlocks.clone(), Rng64::from_seed(3)));
        let client = ProtocolClient::new(queue.handle(), items);
        let mut host = MemoryHost::new();
        let p = PlayerId(0x77);
        host.join(p, "Alice");
        Fixture {
            client,
            queue,
            unlocks,
            host,
            p,
        }
    }

    fn target() -> ConnectTarget {
        ConnectTarget {
            url: "ws://127.0.0.1:38281".to_string(),
            slot_name: "Player1".to_string(),
            password: None,
        }
    }

    const CONNECTED: &str =
        r#"[{"cmd":"Connected","slot":3,"team":0,"slot_data":{"goal_level":50,"vault_chest_checks":5,"wooden_chest_weight":0.25}}]"#;

    #[tokio::test]
    async fn connected_records_slot_and_goal_and_announces() {
        let mut f = fixture();
        let _rx = f.client.attach_loopback(target());

        assert_eq!(f.client.handle_text(CONNECTED), 1);

        let s = f.client.status();
        assert_eq!(s.state, SessionState::Connected);
        assert_eq!(s.slot, Some(3));
        assert_eq!(s.team, Some(0));
        assert_eq!(s.goal_level, 50);
        let o = f.client.slot_options();
        assert_eq!(o.vault_chest_checks, 5);
        assert_eq!(o.wooden_chest_weight, 0.25);
        assert_eq!(o.normal_chest_weight, 0.0);

        f.queue.run_pending(&mut f.host);
        assert_eq!(f.host.messages(f.p), vec!["[AP] Connected as Player1"]);
    }

    #[tokio::test]
    async fn duplicate_items_apply_once() {
        let mut f = fixture();
        let _rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);
        f.client.handle_text(
            r#"[{"cmd":"ReceivedItems","index":0,"items":[{"item":43000,"location":500},{"item":43000,"location":500}]}]"#,
        );
        // Network resend of the same delivery.
        f.client.handle_text(
            r#"{"cmd":"ReceivedItems","index":0,"items":[{"item":43000,"location":500}]}"#,
        );
        f.queue.run_pending(&mut f.host);

        assert!(f
            .unlocks
            .is_unlocked_silent(f.p, CapabilityKind::Skill, "Nova"));
        let grants = f
            .host
            .messages(f.p)
            .into_iter()
            .filter(|m| m == "[AP] Unlocked Skill: Nova")
            .count();
        assert_eq!(grants, 1);
        assert_eq!(f.client.status().items_received, 1);
    }

    #[tokio::test]
    async fn items_wait_for_a_player() {
        let mut f = fixture();
        let _rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);
        f.host.leave(f.p);

        let items = r#"[{"cmd":"ReceivedItems","index":0,"items":[{"item":43101,"location":9}]}]"#;
        f.client.handle_text(items);
        f.queue.run_pending(&mut f.host);
        assert_eq!(f.client.status().items_received, 0);

        f.host.join(f.p, "Alice");
        f.client.handle_text(items);
        f.queue.run_pending(&mut f.host);
        assert!(f
            .unlocks
            .is_unlocked_silent(f.p, CapabilityKind::Talent, "haste"));
    }

    #[tokio::test]
    async fn location_check_goes_out_once() {
        let f = fixture();
        let mut rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);

        assert!(f.client.send_location_check(43500));
        assert!(!f.client.send_location_check(43500));
        // Queued but not yet written.
        assert_eq!(f.client.status().checks_sent, 0);
        assert_eq!(f.client.status().checks_pending, 1);

        assert_eq!(
            f.client.write_queued(&mut rx),
            vec![r#"[{"cmd":"LocationChecks","locations":[43500]}]"#]
        );
        assert!(!f.client.send_location_check(43500));
        assert!(rx.try_recv().is_err());
        assert_eq!(f.client.status().checks_sent, 1);
        assert_eq!(f.client.status().checks_pending, 0);
    }

    #[tokio::test]
    async fn checks_and_goal_queued_while_connecting_flush_on_connected() {
        let f = fixture();
        let mut rx = f.client.attach_loopback(target());

        f.client.send_location_check(43401);
        f.client.send_location_check(43400);
        assert!(f.client.send_goal_completion());
        assert!(!f.client.send_goal_completion());
        assert!(rx.try_recv().is_err());
        assert_eq!(f.client.status().checks_pending, 2);

        f.client.handle_text(CONNECTED);
        assert_eq!(f.client.status().goal, GoalState::Queued);
        assert_eq!(
            f.client.write_queued(&mut rx),
            vec![
                r#"[{"cmd":"LocationChecks","locations":[43400,43401]}]"#,
                r#"[{"cmd":"StatusUpdate","status":30}]"#
            ]
        );
        assert_eq!(f.client.status().goal, GoalState::Sent);
    }

    #[tokio::test]
    async fn frames_the_socket_never_wrote_go_out_next_session() {
        let f = fixture();
        let mut rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);
        f.client.send_location_check(43500);
        f.client.send_goal_completion();

        // The socket died with both frames still queued.
        let lost: Vec<Outbound> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(lost.len(), 2);
        f.client.disconnect().unwrap();
        for out in &lost {
            f.client.unwritten(out);
        }
        let s = f.client.status();
        assert_eq!(s.checks_sent, 0);
        assert_eq!(s.checks_pending, 1);
        assert_eq!(s.goal, GoalState::Pending);
        assert!(!f.client.send_location_check(43500));

        let mut rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);
        assert_eq!(
            f.client.write_queued(&mut rx),
            vec![
                r#"[{"cmd":"LocationChecks","locations":[43500]}]"#,
                r#"[{"cmd":"StatusUpdate","status":30}]"#
            ]
        );
        assert_eq!(f.client.status().checks_sent, 1);
        assert_eq!(f.client.status().goal, GoalState::Sent);
    }

    #[tokio::test]
    async fn items_queued_before_disconnect_still_apply() {
        let mut f = fixture();
        let _rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);
        f.client.handle_text(
            r#"[{"cmd":"ReceivedItems","index":0,"items":[{"item":43101,"location":12}]}]"#,
        );
        f.client.disconnect().unwrap();
        assert_eq!(f.client.state(), SessionState::Disconnected);

        f.queue.run_pending(&mut f.host);
        assert!(f
            .unlocks
            .is_unlocked_silent(f.p, CapabilityKind::Talent, "haste"));
        assert_eq!(
            f.host.messages(f.p),
            vec![
                "[AP] Connected as Player1",
                "[AP] Unlocked Talent: Haste",
                "[AP] Disconnected"
            ]
        );
    }

    #[tokio::test]
    async fn oversized_id_is_never_sent() {
        let f = fixture();
        let mut rx = f.client.attach_loopback(target());
        f.client.handle_text(CONNECTED);

        let big = i64::from(i32::MAX) + 10;
        f.client.send_location_check(big);
        assert!(rx.try_recv().is_err());
        assert!(!f.client.send_location_check(big));
    }

    #[tokio::test]
    async fn refusal_records_reason_and_disconnects() {
        let f = fixture();
        let _rx = f.client.attach_loopback(target());
        f.client
            .handle_text(r#"[{"cmd":"ConnectionRefused","errors":["InvalidSlot","InvalidGame"]}]"#);

        let s = f.client.status();
        assert_eq!(s.state, SessionState::Disconnected);
        assert_eq!(s.last_error.as_deref(), Some("InvalidSlot"));
        assert_eq!(f.client.disconnect(), Err(ClientError::NotConnected));

        f.client.handle_text(r#"[{"cmd":"ConnectionRefused"}]"#);
        assert_eq!(f.client.status().last_error.as_deref(), Some("Unknown"));
    }

    #[tokio::test]
    async fn bad_elements_do_not_poison_the_batch() {
        let mut f = fixture();
        let _rx = f.client.attach_loopback(target());
        let n = f.client.handle_text(
            r#"[{"cmd":"Print","text":"hello"},{"nope":1},{"cmd":"Whatever"},{"cmd":"ReceivedItems"},{"cmd":"PrintJSON","data":[{"text":"a"},{"text":"b"}]}]"#,
        );
        assert_eq!(n, 2);
        assert_eq!(f.client.handle_text("not json"), 0);

        f.queue.run_pending(&mut f.host);
        assert_eq!(f.host.messages(f.p), vec!["[AP] hello", "[AP] ab"]);
        assert_eq!(f.client.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn partial_segments_dispatch_as_one_message() {
        let mut f = fixture();
        let _rx = f.client.attach_loopback(target());
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(f.client.clone().dispatch_loop(rx));

        let bytes = CONNECTED.as_bytes();
        let (a, rest) = bytes.split_at(10);
        let (b, c) = rest.split_at(25);
        for (data, last) in [(a, false), (b, false), (c, true)] {
            tx.send(Segment {
                data: data.to_vec(),
                last,
            })
            .await
            .unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(f.client.status().slot, Some(3));
        f.queue.run_pending(&mut f.host);
        assert_eq!(f.host.messages(f.p), vec!["[AP] Connected as Player1"]);
    }

    #[tokio::test]
    async fn connect_while_busy_fails_and_unreachable_server_disconnects() {
        let f = fixture();
        let t = ConnectTarget {
            url: "ws://127.0.0.1:1".to_string(),
            ..target()
        };
        f.client.connect(t.clone()).unwrap();
        // Single-threaded test runtime: the socket task hasn't run yet.
        assert_eq!(
            f.client.connect(t),
            Err(ClientError::Busy(SessionState::Connecting))
        );

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while f.client.state() != SessionState::Disconnected
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let s = f.client.status();
        assert_eq!(s.state, SessionState::Disconnected);
        assert!(s.last_error.is_some());
    }

    #[test]
    fn connect_needs_a_runtime() {
        let f = fixture();
        assert_eq!(f.client.connect(target()), Err(ClientError::NoRuntime));
    }

    #[test]
    fn uuid_shape() {
        let u = client_uuid();
        assert_eq!(u.len(), 36);
        assert_eq!(&u[14..15], "4");
        assert_ne!(u, client_uuid());
    }
}
