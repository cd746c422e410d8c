use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use vhbridge::{
    Bridge, BridgeConfig, CapabilityKind, ChestKind, MemoryHost, PlayerId, UpgradeDecision,
};

#[derive(Clone, Debug)]
struct Config {
    config_path: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    slot: Option<String>,
    password: Option<String>,
    tick_ms: u64,
    player: String,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "vhbridge_sim\n\n\
USAGE:\n  vhbridge_sim [--config PATH] [--host H] [--port N] [--slot NAME] [--password PW]\n               [--tick-ms N] [--player NAME]\n\n\
ENV:\n  VHB_CONFIG        default config/vhbridge_connection.json\n  VHB_HOST, VHB_PORT, VHB_SLOT, VHB_PASSWORD, VHB_AUTO_CONNECT\n  VHB_TICK_MS       default 50 (one host tick)\n\n\
COMMANDS (stdin):\n  connect [host port slot [password]] | disconnect | status\n  learn <kind> <name> | upgrade <kind> <name> | level <n>\n  quest | trinket <name> | vault <total> | chest <wooden|normal> | redeem <id>\n  bypass <on|off> | logout | join | poll | quit\n"
    );
    std::process::exit(2);
}

fn parse_args() -> Config {
    let mut config_path = std::env::var("VHB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| BridgeConfig::default_path());
    let mut tick_ms: u64 = std::env::var("VHB_TICK_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50)
        .max(1);
    let mut host = None;
    let mut port = None;
    let mut slot = None;
    let mut password = None;
    let mut player = "Hunter".to_string();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                config_path = PathBuf::from(it.next().unwrap_or_else(|| usage_and_exit()))
            }
            "--host" => host = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            "--port" => {
                port = Some(
                    it.next()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or_else(|| usage_and_exit()),
                )
            }
            "--slot" => slot = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            "--password" => password = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            "--tick-ms" => {
                tick_ms = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| usage_and_exit())
            }
            "--player" => player = it.next().unwrap_or_else(|| usage_and_exit()),
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        config_path,
        host,
        port,
        slot,
        password,
        tick_ms,
        player,
    }
}

fn load_bridge_config(cfg: &Config) -> anyhow::Result<BridgeConfig> {
    let mut bc = BridgeConfig::load(&cfg.config_path)
        .with_context(|| format!("load {}", cfg.config_path.display()))?;
    bc.apply_env();
    if let Some(h) = &cfg.host {
        bc.host = h.clone();
    }
    if let Some(p) = cfg.port {
        bc.port = p;
    }
    if let Some(s) = &cfg.slot {
        bc.slot_name = s.clone();
    }
    if let Some(pw) = &cfg.password {
        bc.password = pw.clone();
    }
    Ok(bc)
}

/// The simulated game: one in-memory host plus the bridge driving it.
struct Sim {
    bridge: Bridge,
    host: MemoryHost,
    player: PlayerId,
    player_name: String,
}

impl Sim {
    fn flush_messages(&mut self) {
        for m in self.host.take_messages(self.player) {
            println!("<{}> {m}", self.player_name);
        }
    }

    /// Returns false on quit.
    fn command(&mut self, line: &str) -> bool {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            return true;
        };
        let rest: Vec<&str> = words.collect();
        let p = self.player;

        match cmd {
            "quit" | "exit" => return false,
            "connect" => {
                let res = match rest.as_slice() {
                    [] => self.bridge.reconnect(),
                    [host, port, slot, pw @ ..] => match port.parse::<u16>() {
                        Ok(port) => self.bridge.connect(host, port, slot, pw.first().copied()),
                        Err(_) => {
                            println!("bad port: {port}");
                            return true;
                        }
                    },
                    _ => {
                        println!("usage: connect [host port slot [password]]");
                        return true;
                    }
                };
                match res {
                    Ok(()) => println!("Connecting to {} ...", self.bridge.target().url),
                    Err(e) => println!("Cannot connect: {e}"),
                }
            }
            "disconnect" => match self.bridge.disconnect() {
                Ok(()) => println!("Disconnected."),
                Err(e) => println!("Cannot disconnect: {e}"),
            },
            "status" => {
                println!("{}", self.bridge.status());
                println!(
                    "Unlocked: {} (bypass {})",
                    self.bridge.unlocks().count(p),
                    if self.bridge.unlocks().debug_bypass() { "on" } else { "off" }
                );
            }
            "learn" | "upgrade" => {
                let Some(kind) = rest
                    .first()
                    .and_then(|k| CapabilityKind::parse(k))
                    .filter(|_| rest.len() >= 2)
                else {
                    println!("usage: {cmd} <skill|talent|expertise|mod> <name>");
                    return true;
                };
                let name = rest[1..].join(" ");
                if cmd == "upgrade" {
                    match self.bridge.before_upgrade(&mut self.host, p, kind, &name) {
                        UpgradeDecision::Allow => self.host.learn(p, kind, &name),
                        UpgradeDecision::Deny => println!("(upgrade blocked)"),
                    }
                } else {
                    self.host.learn(p, kind, &name);
                }
            }
            "level" => match rest.first().and_then(|v| v.parse().ok()) {
                Some(n) => self.host.set_level(p, n),
                None => println!("usage: level <n>"),
            },
            "quest" => match self.bridge.on_quest_completed(p) {
                Some(id) => println!("Quest check {id}"),
                None => println!("No quest checks left"),
            },
            "trinket" => {
                let name = rest.join(" ");
                if self.bridge.on_collectible_found(p, &name).is_none() {
                    println!("Unknown trinket: {name}");
                }
            }
            "vault" => match rest.first().and_then(|v| v.parse().ok()) {
                Some(total) => {
                    self.bridge.on_vault_completed(p, total);
                }
                None => println!("usage: vault <total completed>"),
            },
            "chest" => match rest.first().and_then(|k| ChestKind::parse(k)) {
                Some(kind) => match self.bridge.on_chest_opened(p, kind) {
                    Some(id) => println!("The chest holds check token {id} (use: redeem {id})"),
                    None => println!("Nothing special in this chest."),
                },
                None => println!("usage: chest <wooden|normal>"),
            },
            "redeem" => match rest.first().and_then(|v| v.parse().ok()) {
                Some(id) => {
                    if !self.bridge.redeem_chest_check(p, id) {
                        println!("Nothing to redeem for {id}");
                    }
                }
                None => println!("usage: redeem <id>"),
            },
            "bypass" => match rest.first().copied() {
                Some("on") => self.bridge.set_debug_bypass(true),
                Some("off") => self.bridge.set_debug_bypass(false),
                _ => println!("usage: bypass <on|off>"),
            },
            "logout" => {
                self.bridge.on_player_logout(p);
                self.host.leave(p);
                println!("{} logged out", self.player_name);
            }
            "join" => {
                self.host.join(p, &self.player_name);
                println!("{} joined", self.player_name);
            }
            "poll" => {
                for o in self.bridge.poll_now(&mut self.host) {
                    println!("{:?}", o.status);
                }
            }
            _ => println!("unknown command: {cmd}"),
        }
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vhbridge=info".into()),
        )
        .with_target(false)
        .init();

    let cfg = parse_args();
    let bridge_cfg = load_bridge_config(&cfg)?;
    info!(
        config=%cfg.config_path.display(),
        url=%bridge_cfg.ws_url(),
        slot=%bridge_cfg.slot_name,
        tick_ms = cfg.tick_ms,
        "vhbridge sim starting"
    );

    let player = PlayerId::random();
    let mut host = MemoryHost::new();
    host.join(player, &cfg.player);
    host.set_level(player, 1);

    let bridge = Bridge::new(bridge_cfg).with_config_path(cfg.config_path.clone());
    if bridge.auto_connect() {
        info!("auto-connect started");
    }

    let mut sim = Sim {
        bridge,
        host,
        player,
        player_name: cfg.player.clone(),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(cfg.tick_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Some(outcomes) = sim.bridge.on_tick(&mut sim.host) {
                    for o in outcomes {
                        if let Some(r) = o.enforcement.filter(|r| !r.is_clean()) {
                            warn!(player=%o.player, removed = r.removed.len(), failed = r.failed.len(), "enforcement acted");
                        }
                    }
                }
                sim.flush_messages();
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };
                if !sim.command(line.trim()) {
                    break;
                }
                sim.flush_messages();
            }
        }
    }

    if sim.bridge.disconnect().is_ok() {
        info!("disconnected on exit");
    }
    Ok(())
}
