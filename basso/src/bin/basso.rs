//! `basso` CLI entry point — the CLI/environment surface.
//!
//! A small hand-rolled `std::env::args()` dispatcher rather than an
//! argument-parsing crate: this binary's three subcommands are few and
//! fixed enough not to need one.
//!
//! Commands: `backtest` (replay a recorded signal stream through the
//! engine against a simulated gateway), `live` (start the scheduled
//! control loops; the webhook listener itself is out of scope), `verify`
//! (health-check configuration, gateway reachability, and schedule
//! presence without processing anything). Exit codes: 0 success, 1
//! configuration error, 2 gateway unreachable at startup, 3 schema
//! migration required (here: the schedule file failed to parse against
//! the current `ScheduledEntry` shape).

use basso_core::confirmation::ConfirmationBus;
use basso_core::duplicate::DuplicateDetector;
use basso_core::engine::{SignalEngine, SignalEngineDeps};
use basso_core::logging::init_logging;
use basso_core::notifier::LoggingNotifier;
use basso_core::shutdown::ShutdownSignal;
use basso_core::system::config::SystemConfig;
use basso_core::{AuditStore, InMemoryAuditStore};
use basso_execution::gateway::{BrokerGateway, Funds};
use basso_execution::SimulatedBrokerGateway;
use basso_hedge::constants::HedgeConfig as HedgeConstants;
use basso_hedge::schedule::ScheduledEntry;
use basso_hedge::selector::OptionChainSource;
use basso_hedge::{HedgeOrchestrator, MarginMonitor, StrategySchedule, TickContext};
use basso_markets::clock::{Clock, SystemClock};
use basso_markets::instrument::Instrument;
use basso_markets::signal::Signal;
use basso_risk::portfolio::EquityMode;
use basso_risk::PortfolioState;
use chrono::Utc;
use rust_decimal::Decimal;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// The two index underlyings the auto-hedge orchestrator straddles
/// (`basso_hedge::constants::margin_per_basket` has rows for exactly these).
const HEDGE_UNIVERSE: [Instrument; 2] = [Instrument::Nifty, Instrument::Sensex];

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_GATEWAY_UNREACHABLE: u8 = 2;
const EXIT_SCHEMA_MIGRATION: u8 = 3;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let opts = CliOptions::parse(&args[1..]);

    let code = match command.as_str() {
        "backtest" => rt.block_on(run_backtest(opts)),
        "live" => rt.block_on(run_live(opts)),
        "verify" => rt.block_on(run_verify(opts)),
        other => {
            eprintln!("unknown command: {other}");
            print_usage();
            EXIT_CONFIG_ERROR
        }
    };

    ExitCode::from(code)
}

fn print_usage() {
    eprintln!("usage: basso <backtest|live|verify> [--config <path>] [--signals <path>] [--schedule <path>]");
}

/// Flags common to all three subcommands, parsed by hand for a clap-free
/// CLI surface.
struct CliOptions {
    config_path: Option<String>,
    signals_path: Option<String>,
    schedule_path: Option<String>,
    live_gateway: bool,
}

impl CliOptions {
    fn parse(args: &[String]) -> Self {
        let mut config_path = None;
        let mut signals_path = None;
        let mut schedule_path = None;
        let mut live_gateway = false;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => config_path = iter.next().cloned(),
                "--signals" => signals_path = iter.next().cloned(),
                "--schedule" => schedule_path = iter.next().cloned(),
                "--live" => live_gateway = true,
                _ => {}
            }
        }
        Self {
            config_path,
            signals_path,
            schedule_path,
            live_gateway,
        }
    }

    fn load_system_config(&self) -> Result<SystemConfig, String> {
        match &self.config_path {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read config file {path}: {e}"))?;
                SystemConfig::load(&source).map_err(|e| e.to_string())
            }
            None => Ok(SystemConfig::default()),
        }
    }
}

/// Everything shared across commands: the engine's injected capabilities,
/// built once per process (Design Note "global singletons").
struct Runtime {
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn BrokerGateway>,
    audit: Arc<InMemoryAuditStore>,
    portfolio: Arc<PortfolioState>,
    system_config: SystemConfig,
}

fn build_runtime(system_config: SystemConfig, use_live_gateway: bool) -> Runtime {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway: Arc<dyn BrokerGateway> = if use_live_gateway {
        live_gateway()
    } else {
        let funds = Funds {
            used_margin: Decimal::ZERO,
            available_cash: system_config.initial_capital,
            collateral: Decimal::ZERO,
            m2m_realized: Decimal::ZERO,
            m2m_unrealized: Decimal::ZERO,
        };
        let simulated = SimulatedBrokerGateway::new(clock.clone(), funds);
        // Seed the hedge universe's index quotes so a simulated `live` run
        // can actually drive the hedge tick loop end-to-end without a real
        // quote feed, which this platform's broker wire format leaves out
        // of scope.
        for index in HEDGE_UNIVERSE {
            simulated.seed_quote(index.as_str(), default_spot(index));
        }
        Arc::new(simulated)
    };
    let audit = Arc::new(InMemoryAuditStore::new());
    let portfolio = Arc::new(PortfolioState::new(
        system_config.initial_capital,
        EquityMode::Blended {
            unrealized_weight: system_config.portfolio.blended_unrealized_weight,
        },
    ));

    Runtime {
        clock,
        gateway,
        audit,
        portfolio,
        system_config,
    }
}

/// Constructs the live broker backend from `BASSO_BROKER_ENDPOINT`/
/// `BASSO_BROKER_API_KEY`. Behind the `live` feature only — without it
/// there is no wire backend to construct, and `--live` falls back to the
/// simulated gateway with a warning.
#[cfg(feature = "live")]
fn live_gateway() -> Arc<dyn BrokerGateway> {
    Arc::new(basso_broker::LiveBrokerGateway::new(basso_broker::LiveBrokerConfig {
        endpoint: std::env::var("BASSO_BROKER_ENDPOINT").unwrap_or_default(),
        api_key: std::env::var("BASSO_BROKER_API_KEY").unwrap_or_default(),
    }))
}

#[cfg(not(feature = "live"))]
fn live_gateway() -> Arc<dyn BrokerGateway> {
    tracing::warn!("--live requested but this binary was built without the `live` feature; falling back to the simulated gateway");
    let funds = Funds {
        used_margin: Decimal::ZERO,
        available_cash: Decimal::ZERO,
        collateral: Decimal::ZERO,
        m2m_realized: Decimal::ZERO,
        m2m_unrealized: Decimal::ZERO,
    };
    Arc::new(SimulatedBrokerGateway::new(Arc::new(SystemClock), funds))
}

/// Mirrors `live_gateway`'s feature-gated split for the option-chain
/// capability the hedge orchestrator needs every tick.
#[cfg(feature = "live")]
fn build_option_source(_use_live: bool) -> Arc<dyn OptionChainSource> {
    Arc::new(basso_broker::LiveOptionChainSource::new(basso_broker::LiveBrokerConfig {
        endpoint: std::env::var("BASSO_BROKER_ENDPOINT").unwrap_or_default(),
        api_key: std::env::var("BASSO_BROKER_API_KEY").unwrap_or_default(),
    }))
}

#[cfg(not(feature = "live"))]
fn build_option_source(use_live: bool) -> Arc<dyn OptionChainSource> {
    if use_live {
        tracing::warn!("--live requested but this binary was built without the `live` feature; falling back to the simulated option chain");
    }
    let source = basso_broker::SimulatedOptionChainSource::new();
    for index in HEDGE_UNIVERSE {
        source.seed_spot(index.as_str(), default_spot(index));
    }
    Arc::new(source)
}

/// Placeholder spot levels for the simulated option-chain source — this
/// binary has no live index-quote feed of its own, so the simulated
/// `live`/backtest path anchors the synthetic chain near each index's
/// typical level rather than leaving it at the source's generic default
/// for both indices.
fn default_spot(index: Instrument) -> Decimal {
    match index {
        Instrument::Sensex => Decimal::from(81_000),
        _ => Decimal::from(25_000),
    }
}

fn build_engine(runtime: &Runtime) -> SignalEngine {
    let duplicate_detector = Arc::new(DuplicateDetector::new(
        runtime.clock.clone(),
        runtime.system_config.duplicate_detector.window,
        runtime.system_config.duplicate_detector.capacity,
        runtime.system_config.duplicate_detector.prune_every_n_checks,
    ));
    let (confirmation, mut receiver) = ConfirmationBus::new(16);
    // No operator surface is wired up in this binary (the webhook/CLI
    // prompt itself is out of scope); outstanding requests auto-resolve to
    // their own default decision via the bus's timeout, so this task only
    // exists to drain the channel and prevent senders from blocking on a
    // full queue.
    tokio::spawn(async move { while receiver.recv().await.is_some() {} });

    SignalEngine::new(SignalEngineDeps {
        clock: runtime.clock.clone(),
        duplicate_detector,
        portfolio: runtime.portfolio.clone(),
        gateway: runtime.gateway.clone(),
        audit: runtime.audit.clone(),
        notifier: Arc::new(LoggingNotifier),
        confirmation,
        validator_config: runtime.system_config.validator.clone(),
        portfolio_config: runtime.system_config.portfolio.clone(),
    })
}

fn into_hedge_constants(config: &basso_core::system::config::HedgeConfig) -> HedgeConstants {
    HedgeConstants {
        entry_trigger_pct: config.entry_trigger_percent,
        entry_target_pct: config.entry_target_percent,
        exit_trigger_pct: config.exit_trigger_percent,
        lookahead_minutes: config.lookahead_minutes,
        exit_buffer_minutes: config.exit_buffer_minutes,
        min_premium: config.min_premium,
        max_premium: config.max_premium,
        max_hedge_cost_per_day: config.max_hedge_cost_per_day,
        cooldown: std::time::Duration::from_secs(config.cooldown_seconds),
        min_exit_value: config.min_exit_value,
        ..HedgeConstants::default()
    }
}

/// One line of a recorded signal stream. Field names mirror [`Signal`]
/// directly (this is a recorded-and-replayed internal format, not the
/// webhook wire format `Signal::try_from_webhook_json` parses).
#[derive(Debug, serde::Deserialize)]
struct RecordedSignal {
    chart_ts: chrono::DateTime<Utc>,
    kind: String,
    instrument: String,
    slot: String,
    price: Decimal,
    stop: Decimal,
    suggested_lots: u32,
    atr: Decimal,
    #[serde(default)]
    er: Decimal,
    #[serde(default)]
    supertrend: Decimal,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    roc: Option<Decimal>,
    #[serde(default)]
    highest: Option<Decimal>,
}

async fn run_backtest(opts: CliOptions) -> u8 {
    let system_config = match opts.load_system_config() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return EXIT_CONFIG_ERROR;
        }
    };

    let Some(signals_path) = &opts.signals_path else {
        eprintln!("backtest requires --signals <path>");
        return EXIT_CONFIG_ERROR;
    };
    let source = match std::fs::read_to_string(signals_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("failed to read signal stream {signals_path}: {err}");
            return EXIT_CONFIG_ERROR;
        }
    };

    let runtime = build_runtime(system_config, false);
    let engine = build_engine(&runtime);

    let mut summary = basso_analytics::summary::TradingDaySummaryGenerator::init(runtime.clock.now());
    for (line_no, line) in source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let recorded: RecordedSignal = match serde_json::from_str(line) {
            Ok(recorded) => recorded,
            Err(err) => {
                eprintln!("skipping malformed line {}: {err}", line_no + 1);
                continue;
            }
        };
        let signal = match build_signal(recorded) {
            Ok(signal) => signal,
            Err(err) => {
                eprintln!("skipping invalid signal on line {}: {err}", line_no + 1);
                continue;
            }
        };

        summary.record_signal_received();
        let outcome = engine.process(signal).await;
        match outcome {
            basso_core::Outcome::Executed => summary.record_executed(),
            basso_core::Outcome::Duplicate => summary.record_duplicate(),
            basso_core::Outcome::Rejected | basso_core::Outcome::Blocked => summary.record_rejected(),
            basso_core::Outcome::Error | basso_core::Outcome::ConfirmedOverride => {}
        }
        tracing::info!(line = line_no + 1, ?outcome, "processed recorded signal");
    }

    let recent = runtime.audit.recent(usize::MAX).await;
    let report = summary.generate();
    println!(
        "backtest complete: {} signals received, {} executed, {} duplicate, {} rejected, {} audit records",
        report.signals_received,
        report.signals_executed,
        report.signals_duplicate,
        report.signals_rejected,
        recent.len()
    );
    EXIT_OK
}

fn build_signal(recorded: RecordedSignal) -> Result<Signal, String> {
    use std::str::FromStr;
    let kind = recorded
        .kind
        .parse::<basso_markets::signal::SignalKind>()
        .map_err(|e| e.to_string())?;
    let instrument = basso_markets::instrument::Instrument::from_str(&recorded.instrument)
        .map_err(|e| e.to_string())?;
    let slot = recorded
        .slot
        .parse::<basso_markets::signal::Slot>()
        .map_err(|e| e.to_string())?;
    Signal::try_new(
        Utc::now(),
        recorded.chart_ts,
        kind,
        instrument,
        slot,
        recorded.price,
        recorded.stop,
        recorded.suggested_lots,
        recorded.atr,
        recorded.er,
        recorded.supertrend,
        recorded.reason,
        recorded.roc,
        recorded.highest,
    )
    .map_err(|e| e.to_string())
}

async fn run_verify(opts: CliOptions) -> u8 {
    let system_config = match opts.load_system_config() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return EXIT_CONFIG_ERROR;
        }
    };

    let runtime = build_runtime(system_config, opts.live_gateway);
    if let Err(err) = runtime.gateway.funds().await {
        eprintln!("gateway unreachable: {err}");
        return EXIT_GATEWAY_UNREACHABLE;
    }

    if let Some(schedule_path) = &opts.schedule_path {
        match std::fs::read_to_string(schedule_path) {
            Ok(source) => match serde_json::from_str::<Vec<ScheduledEntry>>(&source) {
                Ok(entries) => println!("schedule loadable: {} entries", entries.len()),
                Err(err) => {
                    eprintln!("schedule file does not match the expected schema: {err}");
                    return EXIT_SCHEMA_MIGRATION;
                }
            },
            Err(err) => {
                eprintln!("failed to read schedule file {schedule_path}: {err}");
                return EXIT_CONFIG_ERROR;
            }
        }
    }

    println!("configuration valid, gateway reachable");
    EXIT_OK
}

fn load_schedule(schedule_path: &Option<String>) -> Result<Vec<ScheduledEntry>, String> {
    match schedule_path {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read schedule file {path}: {e}"))?;
            serde_json::from_str(&source)
                .map_err(|e| format!("schedule file does not match the expected schema: {e}"))
        }
        None => Ok(Vec::new()),
    }
}

/// Number of today's scheduled entries for `index`, or the conservative
/// default of one basket when no schedule file was supplied — mirroring the
/// signal engine's own `PORTFOLIO_GATE_ESTIMATED_LOTS` fallback for sizing
/// decisions that otherwise have no real data to size against.
fn num_baskets_for(schedule: &StrategySchedule, index: Instrument) -> u32 {
    let count = schedule
        .entries_within(24 * 60)
        .into_iter()
        .filter(|e| e.entry.index_name.eq_ignore_ascii_case(index.as_str()))
        .count();
    count.max(1) as u32
}

async fn run_live(opts: CliOptions) -> u8 {
    init_logging();
    let system_config = match opts.load_system_config() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return EXIT_CONFIG_ERROR;
        }
    };

    let runtime = build_runtime(system_config.clone(), opts.live_gateway);
    let initial_funds = match runtime.gateway.funds().await {
        Ok(funds) => funds,
        Err(err) => {
            eprintln!("gateway unreachable: {err}");
            return EXIT_GATEWAY_UNREACHABLE;
        }
    };

    let _engine = build_engine(&runtime);
    let hedge_constants = into_hedge_constants(&system_config.hedge);

    let schedule_entries = match load_schedule(&opts.schedule_path) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("{err}");
            return EXIT_SCHEMA_MIGRATION;
        }
    };
    let schedule = Arc::new(StrategySchedule::new(
        runtime.clock.clone(),
        schedule_entries,
        system_config.hedge.lookahead_minutes,
        system_config.hedge.exit_buffer_minutes,
    ));

    let margin_monitor = Arc::new(MarginMonitor::new(
        system_config.margin.total_budget,
        HEDGE_UNIVERSE.to_vec(),
    ));
    // Baseline capture runs once per session: the funds read above,
    // already needed for the reachability check, doubles as the session's
    // opening snapshot.
    margin_monitor.capture_baseline(initial_funds.used_margin);

    let orchestrator = Arc::new(HedgeOrchestrator::new(
        hedge_constants,
        runtime.clock.clone(),
        Arc::new(LoggingNotifier),
    ));
    let option_source = build_option_source(opts.live_gateway);

    let (shutdown, _root_shutdown_rx) = ShutdownSignal::new();

    let margin_gateway = runtime.gateway.clone();
    let margin_clock = runtime.clock.clone();
    let margin_handle = margin_monitor.clone();
    let snapshot_interval = system_config.margin.snapshot_interval;
    let mut margin_shutdown_rx = shutdown.subscribe();
    let margin_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(snapshot_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = margin_shutdown_rx.changed() => break,
            }
            match margin_handle.snapshot(margin_gateway.as_ref(), margin_clock.now()).await {
                Ok(snapshot) => tracing::info!(
                    utilisation_pct = %snapshot.utilisation_pct,
                    "margin snapshot recorded"
                ),
                Err(err) => tracing::warn!(%err, "margin snapshot failed"),
            }
        }
    });

    let hedge_gateway = runtime.gateway.clone();
    let hedge_clock = runtime.clock.clone();
    let hedge_schedule = schedule.clone();
    let hedge_margin = margin_monitor.clone();
    let hedge_orchestrator = orchestrator.clone();
    let tick_interval = Duration::from_secs(system_config.hedge.tick_interval_seconds);
    let mut hedge_shutdown_rx = shutdown.subscribe();
    let hedge_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = hedge_shutdown_rx.changed() => break,
            }
            let today = hedge_clock.now().date_naive();
            // `MarginMonitor` only exposes the last snapshot's utilisation
            // percentage; recover the rupee figure `project_margin` needs
            // from that percentage and the same budget it was computed
            // against (`pct = intraday_used / total_budget * 100`).
            let current_intraday_margin = hedge_margin
                .latest_utilisation_pct()
                .map(|pct| pct / Decimal::from(100) * system_config.margin.total_budget)
                .unwrap_or(Decimal::ZERO);

            for index in HEDGE_UNIVERSE {
                let num_baskets = num_baskets_for(&hedge_schedule, index);
                let should_hold_hedges = hedge_schedule.should_hold_hedges();
                let spot = match hedge_gateway.quote(index.as_str(), index.exchange()).await {
                    Ok(quote) => quote.ltp,
                    Err(err) => {
                        tracing::warn!(%err, index = %index, "failed to fetch spot for hedge tick; skipping");
                        continue;
                    }
                };
                let lots_per_basket = basso_hedge::constants::lots_per_basket(index);
                let lot_size = index.lot_size(today);
                let unhedged_short_quantity =
                    Decimal::from(lots_per_basket * lot_size * num_baskets);

                let ctx = TickContext {
                    index,
                    expiry: today,
                    expiry_type: basso_hedge::constants::ExpiryType::ZeroDte,
                    num_baskets,
                    spot,
                    current_intraday_margin,
                    total_budget: system_config.margin.total_budget,
                    unhedged_short_quantity,
                    should_hold_hedges,
                    gateway: hedge_gateway.as_ref(),
                    option_source: option_source.as_ref(),
                };

                match hedge_orchestrator.tick(ctx).await {
                    Ok(outcome) => tracing::info!(index = %index, ?outcome, "hedge tick complete"),
                    Err(err) => tracing::warn!(index = %index, %err, "hedge tick failed"),
                }
            }
        }
    });

    tracing::info!(
        "basso live started; this platform's webhook listener is out of scope \
         so no inbound signal transport is wired in — the signal engine above is ready to \
         process signals handed to it in-process. Margin snapshots and hedge ticks now run \
         on their own schedules. Waiting for shutdown signal."
    );

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested; draining margin and hedge loops");
    shutdown.trigger();
    let _ = tokio::join!(margin_task, hedge_task);

    let audit_count = runtime.audit.count().await;
    tracing::info!(audit_records = audit_count, "basso live shut down cleanly");
    EXIT_OK
}
