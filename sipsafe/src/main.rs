//! sipsafe - blood alcohol tracking from the terminal
//!
//! Each invocation resumes the persisted session. Commands that change it
//! (start, end, log, remove) save it back, so hydration reminders and the
//! one-shot emergency alert behave the same across separate runs. `status`
//! and `watch` only read it.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/sipsafe/sipsafe.db (~/.local/share/sipsafe/sipsafe.db)
//! - Config: $XDG_CONFIG_HOME/sipsafe/config.toml (~/.config/sipsafe/config.toml)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use sipsafe_core::alerts::{compose_alert_message, dispatch_alert, gateway_addresses, prepare_recipients};
use sipsafe_core::bac::abv::FALLBACK_CUSTOM_ABV;
use sipsafe_core::bac::{self, estimate_custom_abv, volume_ml_from_standard_drinks, DrinkPreset, PRESETS};
use sipsafe_core::collaborators::StaticProfile;
use sipsafe_core::session::{
    log_verified_drink, persist_in_background, resolve_profile, shared, spawn_ticker, GateOutcome,
    PersistOutcome,
};
use sipsafe_core::{
    AnalyticsRange, AnalyticsService, BackendClient, Config, Database, DrinkAmount, DrinkEvent,
    Error, SessionSignal, SessionSnapshot, SessionTracker,
};

#[derive(Parser)]
#[command(name = "sipsafe")]
#[command(about = "Estimate BAC, track a drinking session and review your history")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new session, clearing drinks, reminders and the alert guard
    Start,

    /// End the current session
    End,

    /// Log a drink into the current session
    Log {
        /// Preset (BEER, WINE, SHOT, COCKTAIL, SELTZER, CIDER) or a custom drink name
        drink: String,

        /// Size in standard drinks (14 g ethanol each)
        #[arg(long = "std", conflicts_with = "volume_ml")]
        standard_drinks: Option<f64>,

        /// Size as a volume in millilitres
        #[arg(long)]
        volume_ml: Option<f64>,

        /// Alcohol by volume, in percent
        #[arg(long)]
        abv: Option<f64>,

        /// Base spirit of a custom drink (vodka, rum, tequila, ...)
        #[arg(long)]
        spirit: Option<String>,

        /// Perceived strength of a custom drink (light, medium, strong)
        #[arg(long)]
        strength: Option<String>,

        /// Photo of the drink to verify before logging
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Remove a drink by id (or a unique id prefix)
    Remove { id: String },

    /// Show current BAC, zone and drinks
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep recomputing BAC until Ctrl-C
    Watch {
        /// Seconds between updates (default: from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Consumption history over a range (1d, 1w, 1m, 1y, all)
    Analytics {
        /// Range to aggregate (default: from config)
        #[arg(short, long)]
        range: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send the emergency alert to configured contacts now
    Alert,

    /// List quick-log drink presets
    Presets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;
    config
        .backend
        .validate()
        .context("invalid backend configuration")?;

    let _log_guard =
        sipsafe_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match args.command {
        Command::Start => cmd_start(&config, &open_database()?).await,
        Command::End => cmd_end(&config, &open_database()?).await,
        Command::Log {
            drink,
            standard_drinks,
            volume_ml,
            abv,
            spirit,
            strength,
            photo,
        } => {
            let drink = resolve_drink(
                &drink,
                standard_drinks,
                volume_ml,
                abv,
                spirit.as_deref(),
                strength.as_deref(),
            )?;
            cmd_log(&config, open_database()?, drink, photo).await
        }
        Command::Remove { id } => cmd_remove(&config, &open_database()?, &id).await,
        Command::Status { json } => cmd_status(&config, &open_database()?, json).await,
        Command::Watch { interval } => cmd_watch(&config, &open_database()?, interval).await,
        Command::Analytics { range, json } => {
            cmd_analytics(&config, open_database()?, range, json).await
        }
        Command::Alert => cmd_alert(&config, &open_database()?).await,
        Command::Presets => {
            cmd_presets();
            Ok(())
        }
    }
}

fn open_database() -> Result<Database> {
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

/// Resume the persisted session, or begin a fresh one.
async fn load_tracker(config: &Config, db: &Database) -> Result<SessionTracker> {
    let source = StaticProfile::new(config.profile.as_ref().map(|p| p.to_profile()));
    let profile = resolve_profile(&source).await;

    let tracker = match db.load_session().context("failed to load session")? {
        Some(state) => SessionTracker::from_state(state, profile),
        None => SessionTracker::new(profile, Utc::now()),
    };
    Ok(tracker.with_hydration_nudge_every(config.session.hydration_nudge_every))
}

fn save_tracker(db: &Database, tracker: &SessionTracker) -> Result<()> {
    db.save_session(tracker.state())
        .context("failed to save session")
}

async fn cmd_start(config: &Config, db: &Database) -> Result<()> {
    let mut tracker = load_tracker(config, db).await?;
    tracker.start_session(Utc::now());
    save_tracker(db, &tracker)?;
    println!("Session started ({})", short_id(&tracker.state().session_id));
    Ok(())
}

async fn cmd_end(config: &Config, db: &Database) -> Result<()> {
    let mut tracker = load_tracker(config, db).await?;
    let now = Utc::now();
    let summary = tracker.snapshot(now);
    tracker.end_session(now);
    save_tracker(db, &tracker)?;

    println!(
        "Session ended after {}: {} drinks ({:.1} standard)",
        summary.duration, summary.drink_count, summary.total_standard_drinks
    );
    if summary.bac > 0.0 {
        println!(
            "Estimated BAC {:.3}%, sober in {}. Don't drive.",
            summary.bac, summary.time_to_sober
        );
    }
    Ok(())
}

/// A drink ready to log: what goes into the session plus the ABV the
/// history record carries.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedDrink {
    label: String,
    amount: DrinkAmount,
    abv: f64,
}

/// Work out a drink's amount and ABV from the command line.
///
/// Explicit `--std`/`--volume-ml` win over the preset size; an explicit
/// `--abv` wins over a spirit estimate, which wins over the preset ABV.
/// A custom drink with no size is one standard drink.
fn resolve_drink(
    drink: &str,
    standard_drinks: Option<f64>,
    volume_ml: Option<f64>,
    abv: Option<f64>,
    spirit: Option<&str>,
    strength: Option<&str>,
) -> Result<ResolvedDrink> {
    let preset = DrinkPreset::find(drink);
    let label = match preset {
        Some(preset) => preset.label.to_string(),
        None => drink.trim().to_string(),
    };
    if label.is_empty() {
        bail!("drink name must not be empty");
    }

    let abv = abv
        .or_else(|| spirit.map(|s| estimate_custom_abv(s, strength.unwrap_or("medium"))))
        .or_else(|| preset.map(|p| p.abv))
        .unwrap_or(FALLBACK_CUSTOM_ABV);
    if !(abv > 0.0 && abv <= 100.0) {
        bail!("ABV must be between 0 and 100, got {}", abv);
    }

    let amount = match (standard_drinks, volume_ml) {
        (Some(std), _) => {
            if !(std > 0.0 && std.is_finite()) {
                bail!("--std must be a positive number, got {}", std);
            }
            DrinkAmount::StandardDrinks(std)
        }
        (None, Some(volume_ml)) => {
            if !(volume_ml > 0.0 && volume_ml.is_finite()) {
                bail!("--volume-ml must be a positive number, got {}", volume_ml);
            }
            DrinkAmount::Volume {
                volume_ml,
                abv_percent: abv,
            }
        }
        (None, None) => preset
            .map(DrinkPreset::amount)
            .unwrap_or(DrinkAmount::StandardDrinks(1.0)),
    };

    Ok(ResolvedDrink { label, amount, abv })
}

async fn cmd_log(
    config: &Config,
    db: Database,
    drink: ResolvedDrink,
    photo: Option<PathBuf>,
) -> Result<()> {
    let tracker = load_tracker(config, &db).await?;
    let profile = tracker.profile();
    let session = shared(tracker);
    let backend = BackendClient::from_config(&config.backend)
        .context("failed to create backend client")?
        .map(Arc::new);

    let event = DrinkEvent::new(drink.label.clone(), drink.amount, Utc::now());
    let event_id = event.id.clone();

    let signals = match &photo {
        Some(path) => {
            let Some(client) = &backend else {
                bail!("photo verification needs the backend; enable [backend] in config.toml");
            };
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read photo {}", path.display()))?;
            let timeout = Duration::from_secs(config.session.verification_timeout_secs);
            match log_verified_drink(&session, client.as_ref(), &bytes, event, timeout).await {
                GateOutcome::Logged(signals) => signals,
                GateOutcome::Rejected(summary) => {
                    println!("Drink not logged: {}", summary);
                    return Ok(());
                }
                GateOutcome::Failed(reason) => bail!("could not verify drink: {}", reason),
            }
        }
        None => {
            let mut tracker = session.lock().await;
            tracker.log_drink(event, Utc::now())
        }
    };

    let (snapshot, logged) = {
        let tracker = session.lock().await;
        save_tracker(&db, &tracker)?;
        let logged = tracker
            .state()
            .drinks
            .iter()
            .find(|d| d.id == event_id)
            .cloned()
            .context("logged drink missing from session")?;
        (tracker.snapshot(Utc::now()), logged)
    };

    // History record: presets and standard-drink sizes still carry a volume
    let mut record = logged.to_log_record(Some(bac::peak_contribution(&logged.amount, &profile)));
    if record.volume_ml.is_none() {
        record.volume_ml = Some(volume_ml_from_standard_drinks(
            logged.amount.standard_drinks(),
            drink.abv,
        ));
        record.abv_percent = Some(drink.abv);
    }

    let local = persist_in_background(Arc::new(db), record.clone());
    let remote = backend
        .as_ref()
        .map(|client| persist_in_background(Arc::clone(client), record));

    if let PersistOutcome::Failed { reason, .. } = local.await.context("history write panicked")? {
        eprintln!("warning: drink not saved to history: {}", reason);
    }
    if let Some(remote) = remote {
        if let PersistOutcome::Failed { reason, .. } = remote.await.context("backend write panicked")? {
            eprintln!("warning: drink not synced to backend: {}", reason);
        }
    }

    println!(
        "Logged {} ({:.1} std, id {})",
        logged.label,
        logged.amount.standard_drinks(),
        short_id(&logged.id)
    );
    print_headline(&snapshot);

    for signal in &signals {
        print_signal(signal);
    }
    for signal in &signals {
        if let SessionSignal::EmergencyAlert { bac } = signal {
            if let Err(e) = send_alert(config, *bac).await {
                eprintln!("warning: emergency alert failed: {:#}", e);
            }
        }
    }

    Ok(())
}

async fn cmd_remove(config: &Config, db: &Database, id: &str) -> Result<()> {
    let mut tracker = load_tracker(config, db).await?;

    let matches: Vec<String> = tracker
        .state()
        .drinks
        .iter()
        .filter(|d| d.id.starts_with(id))
        .map(|d| d.id.clone())
        .collect();
    let full_id = match matches.as_slice() {
        [only] => only.clone(),
        [] => return Err(Error::DrinkNotFound(id.to_string()).into()),
        _ => bail!("drink id prefix '{}' is ambiguous", id),
    };

    let signals = tracker.remove_drink(&full_id, Utc::now())?;
    save_tracker(db, &tracker)?;

    println!("Removed drink {}", short_id(&full_id));
    print_headline(&tracker.snapshot(Utc::now()));
    for signal in &signals {
        print_signal(signal);
    }
    Ok(())
}

async fn cmd_status(config: &Config, db: &Database, json: bool) -> Result<()> {
    // Read-only: the snapshot recomputes BAC, so nothing needs saving
    let tracker = load_tracker(config, db).await?;
    let snapshot = tracker.snapshot(Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    print_headline(&snapshot);
    println!("Advice:         {}", snapshot.advice);
    println!(
        "Session:        {} ({} drinks, {:.1} standard)",
        snapshot.duration, snapshot.drink_count, snapshot.total_standard_drinks
    );
    if !snapshot.drinks.is_empty() {
        println!();
        for drink in &snapshot.drinks {
            println!(
                "  {}  {:<10} {:>4.1} std  {}",
                short_id(&drink.id),
                drink.label,
                drink.amount.standard_drinks(),
                local_time(drink.timestamp)
            );
        }
    }
    println!();
    println!("Logs:           {}", sipsafe_core::logging::log_dir().display());
    Ok(())
}

/// Follow the stored session until Ctrl-C.
///
/// Watching never writes the session. Other invocations own every change, so
/// each refresh reloads the stored state and rebuilds the local tracker when
/// it differs from the last copy seen.
async fn cmd_watch(config: &Config, db: &Database, interval: Option<u64>) -> Result<()> {
    let period = Duration::from_secs(interval.unwrap_or(config.session.tick_interval_secs).max(1));
    let tracker = load_tracker(config, db).await?;
    let profile = tracker.profile();
    let mut seen = tracker.state().clone();
    let session = shared(tracker);

    let (signal_tx, mut signal_rx) = tokio::sync::mpsc::unbounded_channel();
    let ticker = spawn_ticker(session.clone(), period, move |signal| {
        let _ = signal_tx.send(signal);
    });

    println!("Watching BAC every {}s. Press Ctrl-C to stop.", period.as_secs());
    let mut refresh = tokio::time::interval(period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(signal) = signal_rx.recv() => print_signal(&signal),
            _ = refresh.tick() => {
                match db.load_session() {
                    Ok(Some(stored)) if stored != seen => {
                        tracing::debug!(drinks = stored.drinks.len(), "Stored session changed");
                        seen = stored.clone();
                        *session.lock().await = SessionTracker::from_state(stored, profile)
                            .with_hydration_nudge_every(config.session.hydration_nudge_every);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Failed to reload session"),
                }

                let snapshot = session.lock().await.snapshot(Utc::now());
                println!(
                    "[{}] {:.3}%  {}  {} drinks  sober in {}",
                    Local::now().format("%H:%M:%S"),
                    snapshot.bac,
                    snapshot.zone,
                    snapshot.drink_count,
                    snapshot.time_to_sober
                );
            }
        }
    }

    ticker.stop().await;
    println!();
    println!("Stopped watching.");
    Ok(())
}

async fn cmd_analytics(
    config: &Config,
    db: Database,
    range: Option<String>,
    json: bool,
) -> Result<()> {
    let range: AnalyticsRange = range
        .as_deref()
        .unwrap_or(&config.analytics.default_range)
        .parse()?;

    let remote = BackendClient::from_config(&config.backend)
        .context("failed to create backend client")?;
    let service =
        AnalyticsService::new(remote, db).with_fallback_limit(config.analytics.fallback_log_limit);
    let report = service
        .get_analytics(range, Local::now())
        .await
        .context("failed to compute analytics")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let result = &report.result;
    println!("Drinks over {} ({:?})", report.range, report.origin);
    println!("========================");
    if report.truncated {
        println!(
            "Note: only the newest {} logs were counted",
            config.analytics.fallback_log_limit
        );
    }
    println!();

    let max = result.buckets.iter().map(|b| b.count).max().unwrap_or(0);
    for bucket in &result.buckets {
        let bar_len = if max > 0 {
            (bucket.count as usize * 30).div_ceil(max as usize)
        } else {
            0
        };
        println!(
            "{:>6}  {:<30} {:>3}  {:>6.1} ml",
            bucket.label,
            "#".repeat(bar_len),
            bucket.count,
            bucket.pure_alcohol_ml
        );
    }

    println!();
    println!("Total drinks:        {}", result.totals.total_drinks);
    println!("Pure alcohol:        {:.1} ml", result.totals.total_pure_alcohol_ml);
    println!(
        "Vs previous period:  {} ({} -> {})",
        result.trends.direction.as_str(),
        result.trends.previous_period_drinks,
        result.trends.current_period_drinks
    );
    println!("Avg gap:             {:.1} h", result.trends.avg_hours_between_drinks);
    println!("Longest gap:         {:.1} h", result.trends.longest_gap_hours);
    if let Some(peak) = result.peak_bucket() {
        println!("Busiest:             {} ({} drinks)", peak.label, peak.count);
    }
    Ok(())
}

async fn cmd_alert(config: &Config, db: &Database) -> Result<()> {
    let tracker = load_tracker(config, db).await?;
    let bac = tracker.snapshot(Utc::now()).bac;
    send_alert(config, bac).await
}

fn cmd_presets() {
    println!("{:<10} {:<10} {:>5} {:>6} {:>8}", "PRESET", "CATEGORY", "STD", "ABV", "VOLUME");
    for preset in PRESETS {
        println!(
            "{:<10} {:<10} {:>5.1} {:>5.1}% {:>5.0} ml",
            preset.label,
            preset.category,
            preset.standard_drinks,
            preset.abv,
            preset.volume_ml()
        );
    }
}

/// Deliver the emergency message through the backend, or print what would
/// have been sent when no backend is configured.
async fn send_alert(config: &Config, bac: f64) -> Result<()> {
    let message = compose_alert_message(bac, &Local::now(), None);

    let Some(client) = BackendClient::from_config(&config.backend)
        .context("failed to create backend client")?
    else {
        let (usable, _) = prepare_recipients(&config.contacts);
        if usable.is_empty() {
            return Err(Error::NoContacts.into());
        }
        println!("Backend not configured; alert NOT sent. Text these contacts:");
        for contact in &usable {
            let addresses = gateway_addresses(&contact.phone, &contact.carrier)?;
            println!("  {} ({}): {}", contact.label, contact.phone, addresses.join(", "));
        }
        println!("Message: {}", message);
        return Ok(());
    };

    let report = dispatch_alert(&client, &message, &config.contacts)
        .await
        .context("failed to send emergency alert")?;
    println!(
        "Emergency alert sent to {} of {} contacts",
        report.sent.len(),
        report.attempted
    );
    for failed in &report.failed {
        println!("  failed: {} ({})", failed.to, failed.error);
    }
    Ok(())
}

fn print_headline(snapshot: &SessionSnapshot) {
    println!("BAC:            {:.3}%", snapshot.bac);
    println!("Zone:           {}", snapshot.zone);
    println!("Sober in:       {}", snapshot.time_to_sober);
}

fn print_signal(signal: &SessionSignal) {
    match signal {
        SessionSignal::ZoneChanged { from, to, bac } => {
            println!("Zone changed: {} -> {} ({:.3}%)", from, to, bac);
        }
        SessionSignal::HydrationNudge { drink_count } => {
            println!(
                "That's {} drinks. Have a glass of water before the next one.",
                drink_count
            );
        }
        SessionSignal::EmergencyAlert { bac } => {
            println!("DANGER: estimated BAC {:.3}%. Alerting emergency contacts.", bac);
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_preset() {
        let drink = resolve_drink("wine", None, None, None, None, None).unwrap();
        assert_eq!(drink.label, "WINE");
        assert_eq!(drink.amount, DrinkAmount::StandardDrinks(1.0));
        assert_eq!(drink.abv, 12.0);
    }

    #[test]
    fn test_resolve_preset_with_explicit_size() {
        let drink = resolve_drink("COCKTAIL", Some(2.0), None, None, None, None).unwrap();
        assert_eq!(drink.amount, DrinkAmount::StandardDrinks(2.0));

        let drink = resolve_drink("beer", None, Some(500.0), None, None, None).unwrap();
        assert_eq!(
            drink.amount,
            DrinkAmount::Volume {
                volume_ml: 500.0,
                abv_percent: 5.0
            }
        );
    }

    #[test]
    fn test_resolve_custom_drink() {
        let drink =
            resolve_drink("Margarita", None, Some(250.0), None, Some("tequila"), Some("strong"))
                .unwrap();
        assert_eq!(drink.label, "Margarita");
        assert_eq!(drink.abv, 16.0);

        // Unknown spirit and no size: one standard drink at the fallback ABV
        let drink = resolve_drink("Mystery punch", None, None, None, None, None).unwrap();
        assert_eq!(drink.amount, DrinkAmount::StandardDrinks(1.0));
        assert_eq!(drink.abv, FALLBACK_CUSTOM_ABV);

        // Explicit ABV beats the spirit estimate
        let drink =
            resolve_drink("Mule", None, None, Some(8.0), Some("vodka"), None).unwrap();
        assert_eq!(drink.abv, 8.0);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        assert!(resolve_drink("  ", None, None, None, None, None).is_err());
        assert!(resolve_drink("BEER", Some(0.0), None, None, None, None).is_err());
        assert!(resolve_drink("BEER", None, Some(-5.0), None, None, None).is_err());
        assert!(resolve_drink("BEER", None, None, Some(150.0), None, None).is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
