//! Arena Wallet Demo
//!
//! Walks one viewer through topping up, joining tournaments and waiting
//! for the room reveal, logging each step.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arena_wallet::{
    check_room_reveal,
    core::clock::{Clock, ManualClock},
    session::profile::{InMemoryProfileStore, ProfileChange, ProfileDocument},
    ArenaConfig, Coins, LedgerSnapshot, RevealWatcher, SessionManager, SessionSnapshot, Tournament, TransactionKind, ViewerId,
    WalletLedger, CURRENCY, VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ArenaConfig::from_env().context("reading configuration")?;
    info!("Arena Wallet v{}", VERSION);
    info!(
        "Reveal window: {} min, poll every {} ms",
        config.reveal_window.num_minutes(),
        config.poll_interval.as_millis()
    );

    demo_ledger()?;
    demo_session(config).await?;
    Ok(())
}

/// Debit, credit and snapshot on a bare ledger.
fn demo_ledger() -> Result<()> {
    info!("=== Ledger ===");
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

    let mut ledger = WalletLedger::with_opening_balance(Coins::whole(1000), clock.clone())?;
    let tx = ledger.debit(Coins::whole(1000), TransactionKind::EntryFee)?;
    info!("Debited {} {}: balance {}", tx.amount(), CURRENCY, ledger.balance());

    let mut small = WalletLedger::with_opening_balance(Coins::whole(50), clock.clone())?;
    match small.debit(Coins::whole(100), TransactionKind::EntryFee) {
        Ok(_) => bail!("debit beyond balance was accepted"),
        Err(err) => info!("Refused: {} (balance still {})", err, small.balance()),
    }

    let mut fresh = WalletLedger::with_clock(clock.clone());
    fresh.credit(Coins::whole(500), TransactionKind::AddMoney)?;
    let pending = fresh.begin_debit(Coins::whole(200), TransactionKind::Withdraw)?;
    info!("Balance {}, available {} while withdrawal pending", fresh.balance(), fresh.available());
    fresh.complete(pending.id())?;
    info!("Withdrawal completed: balance {}", fresh.balance());
    for tx in fresh.history() {
        info!("  {}: {} ({:?})", tx.kind().title(), tx.amount(), tx.status());
    }

    let bytes = fresh.snapshot().to_bytes()?;
    let restored = WalletLedger::restore(LedgerSnapshot::from_bytes(&bytes)?, clock)?;
    info!("Snapshot restored, digest {}", hex::encode(restored.digest()));
    if restored.digest() != fresh.digest() {
        bail!("restored ledger digest differs");
    }
    Ok(())
}

/// Join flow and room reveal through the session manager.
async fn demo_session(config: ArenaConfig) -> Result<()> {
    info!("=== Session ===");
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let config = ArenaConfig { opening_balance: Coins::whole(100), ..config };
    let poll = config.poll_interval;
    let window = config.reveal_window;
    let manager = SessionManager::with_clock(config, clock.clone()).context("building session manager")?;
    info!("Token verification {}", if manager.verifies_tokens() { "enabled" } else { "disabled" });

    let viewer = ViewerId::new([1; 16]);
    let handle = manager.open_session(viewer).await?;

    let profile_store = InMemoryProfileStore::new();
    let profile = {
        let mut session = handle.write().await;
        session.load_profile(ProfileDocument {
            display_name: Some("ScoutOP".into()),
            username: Some("scout".into()),
            ..Default::default()
        });
        session.update_profile(&profile_store, ProfileChange::Avatar("https://placehold.co/256x256.png".into()))?
    };
    info!("Viewer {} ({}) avatar set to {}", viewer, profile.handle, profile.avatar_url);

    let tournament = Tournament::new("t1", "BGMI Ultimate Showdown", Coins::whole(50), start + Duration::minutes(15));

    let first = manager.join_tournament(viewer, &tournament).await?;
    info!("Join: {}", first.message);
    let second = manager.join_tournament(viewer, &tournament).await?;
    info!("Join again: {}", second.message);
    info!("Balance now {} {}", handle.read().await.balance(), CURRENCY);

    for minutes in [15, 5, -1] {
        let at = start + Duration::minutes(15 - minutes);
        info!("{} min before start: reveal = {}", minutes, check_room_reveal(tournament.scheduled_start, window, at));
    }

    let watcher = RevealWatcher::spawn(tournament.id.clone(), tournament.scheduled_start, window, poll, clock.clone());
    clock.advance(Duration::minutes(6));
    let revealed = tokio::time::timeout(poll * 3, watcher.wait_revealed()).await.unwrap_or(false);
    if !revealed {
        warn!("Reveal watcher for {} did not fire", watcher.tournament_id());
    }

    match manager.room_credentials(viewer, &tournament).await? {
        Some(creds) => info!("Room {} / password {}", creds.room_id, creds.password),
        None => warn!("Room credentials still hidden"),
    }

    let snapshot = manager.snapshot(viewer).await?;
    info!(
        "{} ledger entries, {} memberships, digest {}",
        snapshot.ledger.transactions.len(),
        snapshot.memberships.len(),
        hex::encode(snapshot.digest)
    );

    let stored = snapshot.to_json()?;
    manager.close_session(&viewer).await;
    manager.restore_session(viewer, SessionSnapshot::from_json(&stored)?).await?;
    let rejoin = manager.join_tournament(viewer, &tournament).await?;
    info!("Join after restore: {}", rejoin.message);
    if rejoin.success {
        bail!("restored session paid for the same tournament twice");
    }
    manager.close_session(&viewer).await;
    Ok(())
}
