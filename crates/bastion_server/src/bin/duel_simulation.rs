//! # Duel Simulation
//!
//! Two bots log in, queue, and play one full match against the real lobby
//! and supervisor. Every event is logged through `tracing`; the settlement
//! is printed at the end.
//!
//! ```text
//! duel_simulation --seed 7 --mode realtime --duration 20
//! ```
//!
//! Bots are simple: in turn-based mode they deploy the hardest-hitting troop
//! offered, in real-time mode the cheapest one they can afford.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bastion_rules::UnitCatalog;
use bastion_server::session::outbox;
use bastion_server::{Lobby, LobbyHandle, MemoryAccounts, ServerConfig};
use bastion_shared::{ClientCommand, GameOverPayload, MatchModeKind, ServerMessage};
use tracing::{info, warn};

const BOTS: [(&str, &str); 2] = [("ada", "ada-secret"), ("grace", "grace-secret")];

struct Options {
    seed: Option<u64>,
    mode: Option<MatchModeKind>,
    config: Option<PathBuf>,
    duration_secs: Option<u64>,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options { seed: None, mode: None, config: None, duration_secs: None };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--seed" | "-s", Some(v)) => {
                options.seed = Some(v.parse().map_err(|_| format!("bad seed: {v}"))?);
                i += 1;
            }
            ("--mode" | "-m", Some(v)) => {
                options.mode = Some(match v.as_str() {
                    "turn" => MatchModeKind::TurnBased,
                    "realtime" => MatchModeKind::RealTime,
                    other => return Err(format!("unknown mode: {other}")),
                });
                i += 1;
            }
            ("--config" | "-c", Some(v)) => {
                options.config = Some(PathBuf::from(v));
                i += 1;
            }
            ("--duration" | "-d", Some(v)) => {
                options.duration_secs = Some(v.parse().map_err(|_| format!("bad duration: {v}"))?);
                i += 1;
            }
            ("--help" | "-h", _) => {
                println!("Usage: duel_simulation [OPTIONS]");
                println!();
                println!("  -s, --seed <SEED>          Base RNG seed");
                println!("  -m, --mode <turn|realtime> Match mode (default: turn)");
                println!("  -c, --config <PATH>        Server config TOML");
                println!("  -d, --duration <SECS>      Real-time match length");
                println!("  -h, --help                 Show this help");
                std::process::exit(0);
            }
            (flag, _) => return Err(format!("unexpected argument: {flag}")),
        }
        i += 1;
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let options = parse_args()?;
    let mut config = match &options.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(seed) = options.seed {
        config.seed = seed;
    }
    if let Some(mode) = options.mode {
        config.mode = mode;
    }
    if let Some(secs) = options.duration_secs {
        config.match_duration_secs = secs;
    }
    config.validate()?;

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                BASTION - DUEL SIMULATION                         ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ──────────────────────────────────────────────────┐");
    println!("│ Mode:               {:?}", config.mode);
    println!("│ Seed:               {}", config.seed);
    println!("│ Offer Size:         {}", config.offer_size);
    println!("│ Match Duration:     {} s (real-time)", config.match_duration_secs);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let catalog = Arc::new(config.load_catalog()?);
    let store = Arc::new(
        MemoryAccounts::new()
            .with_account(BOTS[0].0, BOTS[0].1)
            .with_account(BOTS[1].0, BOTS[1].1),
    );
    let outbox_capacity = config.outbox_capacity;
    let (lobby, lobby_task) = Lobby::spawn(store.clone(), store, catalog.clone(), config);

    let start = Instant::now();
    let mut bots = Vec::new();
    for (username, secret) in BOTS {
        lobby.login(username, secret).await?;
        let (tx, rx) = outbox::channel(outbox_capacity);
        let ticket = lobby.join_queue(username, tx).await?;
        bots.push((username, ticket, rx));
    }

    let mut players = Vec::new();
    for (username, ticket, rx) in bots {
        let assignment = ticket.wait().await?;
        info!(%username, match_id = %assignment.match_id, seat = %assignment.seat, "assigned");
        let catalog = catalog.clone();
        players.push(tokio::spawn(play(username, assignment, rx, catalog)));
    }

    let mut payloads = Vec::new();
    for player in players {
        payloads.push(player.await?);
    }
    logout_all(&lobby).await;
    drop(lobby);
    let reports = lobby_task.await?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    SETTLEMENT                                    ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    for report in &reports {
        println!("┌─ {} ─────────────────────────────────────────────────────┐", report.match_id);
        println!("│ Result:             {:?} ({:?})", report.result.winner, report.result.reason);
        println!("│ Actions Accepted:   {}", report.actions_accepted);
        println!("│ Messages Dropped:   {}", report.messages_dropped);
        for (seat, settled) in report.settlements.iter().enumerate() {
            println!(
                "│ Seat {seat}:             +{} EXP, level {} -> {} ({} EXP)",
                settled.exp_earned, settled.before.level, settled.after.level, settled.after.exp
            );
        }
        if !report.persistence_errors.is_empty() {
            println!("│ Persistence:        ✗ {} failed", report.persistence_errors.len());
        }
        println!("└──────────────────────────────────────────────────────────────────┘");
    }
    for (username, payload) in &payloads {
        match payload {
            Some(p) => println!("{username}: {:?} wins, +{} EXP, level {}", p.winner, p.exp_earned, p.new_level),
            None => println!("{username}: no game over received"),
        }
    }
    println!();
    println!("Completed in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

async fn play(
    username: &'static str,
    assignment: bastion_server::MatchAssignment,
    mut rx: tokio::sync::mpsc::Receiver<ServerMessage>,
    catalog: Arc<UnitCatalog>,
) -> (&'static str, Option<GameOverPayload>) {
    let seat = assignment.seat;
    while let Some(message) = rx.recv().await {
        let command = match message {
            ServerMessage::TroopOffer { offer } => offer
                .units
                .iter()
                .filter_map(|unit| catalog.troop(unit))
                .max_by_key(|spec| spec.atk)
                .map(|spec| ClientCommand::Deploy { unit: spec.id.clone() }),
            ServerMessage::StateUpdate { snapshot } if snapshot.mode == MatchModeKind::RealTime => snapshot
                .players
                .get(seat.index())
                .and_then(|me| me.mana)
                .and_then(|mana| catalog.cheapest_affordable(mana))
                .map(|spec| ClientCommand::Deploy { unit: spec.id.clone() }),
            ServerMessage::Events { events } => {
                if seat.index() == 0 {
                    for event in events {
                        info!(kind = ?event.kind, "{}", event.message);
                    }
                }
                None
            }
            ServerMessage::GameOver { result } => return (username, Some(result)),
            _ => None,
        };
        if let Some(command) = command {
            if let Err(err) = assignment.session.submit(seat, command).await {
                warn!(%username, %err, "command rejected");
            }
        }
    }
    (username, None)
}

async fn logout_all(lobby: &LobbyHandle) {
    for (username, _) in BOTS {
        if let Err(err) = lobby.logout(username).await {
            warn!(%username, %err, "logout failed");
        }
    }
}
