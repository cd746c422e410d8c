//! `vhbridge`: gates Vault Hunters progression on randomizer-network grants.
//!
//! - `registry` / `tables`: capability names <-> location and item ids
//! - `unlocks`: what each player has been granted
//! - `client`: the server connection, item delivery and outgoing checks
//! - `tracker`: polls the host and turns progress into location checks
//! - `enforcer`: strips capabilities the host shows but nobody granted
//! - `bridge`: all of the above behind one tick-driven facade
//!
//! The host game plugs in through [`HostAdapter`]; all host mutation happens
//! on the thread that calls [`Bridge::on_tick`].

pub mod bridge;
pub mod capability;
pub mod checks;
pub mod chests;
pub mod client;
pub mod config;
pub mod enforcer;
pub mod host;
pub mod host_queue;
pub mod items;
pub mod memory_host;
pub mod players;
pub mod registry;
pub mod rng;
pub mod tables;
pub mod tracker;
pub mod unlocks;

pub use bridge::Bridge;
pub use capability::{CapabilityKind, CapabilityName, Resource};
pub use chests::ChestKind;
pub use client::{
    ClientError, ConnectTarget, ProtocolClient, SessionState, SessionStatus, SlotOptions,
};
pub use config::BridgeConfig;
pub use enforcer::{EnforceReport, Enforcer, UpgradeDecision, UpgradeGate};
pub use host::{GameRule, HostAdapter, HostError, Notice, Reward};
pub use host_queue::{HostHandle, HostQueue};
pub use items::{ItemApplier, ItemGrant};
pub use memory_host::MemoryHost;
pub use players::PlayerId;
pub use registry::Registry;
pub use tracker::{PollOutcome, PollStatus, ProgressSink, ProgressionTracker};
pub use unlocks::{UnlockObserver, UnlockQuery, UnlockStore, UnlockView};
