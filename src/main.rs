// ============================================================================
// candlewatch - Chandelier du segment de prix courant
// ============================================================================
// Programme TUI qui reconstruit le segment courant depuis les logs du
// contrat, le redessine à chaque cycle de polling, et permet de consulter
// les fonds d'une adresse (vue Rewards) et ses soldes wrap / unwrap (vue Wrap)
//
// ARCHITECTURE :
// - Thread UI : boucle render -> input -> tick, possède App et le renderer
// - Worker thread : runtime tokio, cycles de polling et lectures eth_call
// - Channels mpsc : AppCommand (UI -> worker), AppResult (worker -> UI)
// ============================================================================

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info, warn};

use candlewatch::api::{JsonRpcClient, SegmentLocator, SegmentReport};
use candlewatch::app::App;
use candlewatch::config::{ChainConfig, Config};
use candlewatch::models::{AccountFunds, WalletBalances};
use candlewatch::ui::events::{Event, EventHandler};
use candlewatch::ui::{canvas, chart_area, render};

// ============================================================================
// Messages entre le thread UI et le worker
// ============================================================================

/// Commandes envoyées au worker thread
#[derive(Debug, Clone)]
enum AppCommand {
    /// Lance un cycle de polling sans attendre l'intervalle
    Refresh,

    /// Lit lockedFunds / contributions d'une adresse
    LookupAccount { address: [u8; 20] },

    /// Lit les soldes token / wrappé et l'allowance d'une adresse
    LookupWallet { address: [u8; 20] },
}

/// Résultats renvoyés par le worker thread
#[derive(Debug)]
enum AppResult {
    /// Cycle de polling réussi
    SegmentLoaded {
        generation: u64,
        report: SegmentReport,
    },

    /// Cycle de polling en échec (réessayé au cycle suivant)
    PollFailed { generation: u64, error: String },

    AccountLoaded(AccountFunds),

    AccountFailed(String),

    WalletLoaded {
        address: [u8; 20],
        balances: WalletBalances,
    },

    WalletFailed { address: [u8; 20], error: String },
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les println! sont inutilisables une fois le TUI lancé : on logge vers un
// fichier à rotation quotidienne.
//
// # Utilisation
// ```bash
// tail -f ~/.local/share/candlewatch/logs/candlewatch.log.*
// RUST_LOG=candlewatch=trace cargo run
// ```
// ============================================================================

fn init_logging(log_dir: &Path) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all(log_dir).with_context(|| {
        format!(
            "Échec de la création du répertoire de logs {}",
            log_dir.display()
        )
    })?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "candlewatch.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candlewatch=debug,info".into()),
        )
        .try_init()
        .context("Échec de l'initialisation du subscriber tracing")?;

    info!(?log_dir, "Logging initialized");
    Ok(())
}

// ============================================================================
// Point d'entrée
// ============================================================================

fn main() -> Result<()> {
    let config = Config::from_env().context("Configuration invalide")?;

    init_logging(&config.log_dir).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(
        rpc_url = %config.chain.rpc_url,
        contract = %config.chain.contract,
        window = config.chain.block_window,
        decimals = config.chain.price_decimals,
        "candlewatch starting up"
    );

    // Client et runtime créés ici : une erreur de construction remonte
    // proprement au lieu de paniquer dans le worker
    let client = JsonRpcClient::new(config.chain.rpc_url.clone())
        .context("Impossible de créer le client JSON-RPC")?;
    let runtime = tokio::runtime::Runtime::new().context("Impossible de créer le runtime tokio")?;

    let (command_tx, command_rx) = mpsc::channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker thread");
    spawn_background_worker(
        runtime,
        client,
        config.chain.clone(),
        config.poll_interval,
        command_rx,
        result_tx,
    );

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let mut app = App::new(config.render.clone(), config.bands.clone());
    let events = EventHandler::default();

    info!("Starting event loop");
    let result = run(&mut terminal, &mut app, &events, &command_tx, &result_rx);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

// ============================================================================
// Background Worker Thread
// ============================================================================
// - Un cycle au démarrage, puis toutes les `poll_interval`
// - recv_timeout() attend une commande jusqu'à l'échéance du prochain cycle
// - Les cycles sont séquentiels : block_on() n'en exécute qu'un à la fois
// - Chaque cycle porte une génération croissante, que l'UI utilise pour
//   ignorer les résultats périmés
// ============================================================================

fn spawn_background_worker(
    runtime: tokio::runtime::Runtime,
    client: JsonRpcClient,
    chain: ChainConfig,
    poll_interval: Duration,
    command_rx: mpsc::Receiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
) {
    std::thread::spawn(move || {
        let mut generation: u64 = 0;
        let mut next_poll = Instant::now();
        // Lectures reçues pendant le drain d'un Refresh, traitées ensuite
        let mut deferred: VecDeque<AppCommand> = VecDeque::new();

        loop {
            let timeout = next_poll.saturating_duration_since(Instant::now());
            let next = match deferred.pop_front() {
                Some(command) => Ok(command),
                None => command_rx.recv_timeout(timeout),
            };

            let delivered = match next {
                Ok(AppCommand::Refresh) | Err(mpsc::RecvTimeoutError::Timeout) => {
                    // Un seul cycle couvre toutes les demandes déjà en file
                    let pending = drain_pending(&command_rx);
                    if pending.refreshes > 0 {
                        debug!(skipped = pending.refreshes, "Coalesced queued refresh requests");
                    }
                    deferred.extend(pending.lookups);

                    generation += 1;
                    let result = poll_once(&runtime, &client, &chain, generation);
                    next_poll = Instant::now() + poll_interval;
                    result_tx.send(result)
                }
                Ok(AppCommand::LookupAccount { address }) => {
                    let result = runtime.block_on(client.account_funds(&chain.contract, &address));
                    let message = match result {
                        Ok(funds) => {
                            info!(locked = funds.locked, contributions = funds.contributions, "Account funds loaded");
                            AppResult::AccountLoaded(funds)
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to load account funds");
                            AppResult::AccountFailed(e.to_string())
                        }
                    };
                    result_tx.send(message)
                }
                Ok(AppCommand::LookupWallet { address }) => {
                    let result = runtime.block_on(client.wallet_balances(
                        &chain.token,
                        &chain.wrapped_token,
                        &address,
                    ));
                    let message = match result {
                        Ok(balances) => {
                            info!(token = %balances.token, wrapped = %balances.wrapped, "Wallet balances loaded");
                            AppResult::WalletLoaded { address, balances }
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to load wallet balances");
                            AppResult::WalletFailed {
                                address,
                                error: e.to_string(),
                            }
                        }
                    };
                    result_tx.send(message)
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    info!("Worker thread exiting (channel closed)");
                    break;
                }
            };

            if delivered.is_err() {
                info!("Worker thread exiting (UI gone)");
                break;
            }
        }
    });
}

/// Commandes restées en file au début d'un cycle
#[derive(Debug, Default)]
struct Pending {
    /// Refresh absorbés par le cycle qui démarre
    refreshes: usize,

    /// Lectures de compte, dans l'ordre d'arrivée
    lookups: Vec<AppCommand>,
}

/// Vide la file sans bloquer
///
/// Des pressions répétées sur 'r' pendant un cycle lent ne doivent pas
/// s'accumuler en autant de cycles consécutifs.
fn drain_pending(command_rx: &mpsc::Receiver<AppCommand>) -> Pending {
    let mut pending = Pending::default();

    // Empty ou Disconnected : la fermeture est vue au prochain recv_timeout
    while let Ok(command) = command_rx.try_recv() {
        match command {
            AppCommand::Refresh => pending.refreshes += 1,
            lookup => pending.lookups.push(lookup),
        }
    }

    pending
}

/// Exécute un cycle de polling complet
fn poll_once(
    runtime: &tokio::runtime::Runtime,
    client: &JsonRpcClient,
    chain: &ChainConfig,
    generation: u64,
) -> AppResult {
    debug!(generation, "Starting poll cycle");
    let locator = SegmentLocator::new(client, chain);

    match runtime.block_on(locator.locate()) {
        Ok(report) => AppResult::SegmentLoaded { generation, report },
        Err(e) => {
            warn!(generation, error = %e, "Poll cycle failed");
            AppResult::PollFailed {
                generation,
                error: e.to_string(),
            }
        }
    }
}

// ============================================================================
// Event Loop Principal
// ============================================================================
// À chaque itération :
//   0. Appliquer les résultats du worker
//   1. Mesurer la zone graphique (resize de la surface si besoin)
//   2. Dessiner
//   3. Traiter un événement
//   4. Mettre à jour l'avancement du segment
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    command_tx: &mpsc::Sender<AppCommand>,
    result_rx: &mpsc::Receiver<AppResult>,
) -> Result<()> {
    let mut worker_alive = true;

    while app.is_running() {
        // 0. RÉSULTATS
        while worker_alive {
            match result_rx.try_recv() {
                Ok(result) => apply_result(app, result),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    error!("Worker thread disconnected!");
                    worker_alive = false;
                }
            }
        }

        // 1. LAYOUT
        let area = chart_area(terminal.size()?);
        app.sync_layout(canvas::layout_box(area));

        // 2. RENDER
        terminal.draw(|frame| render(frame, app))?;

        // 3. INPUT
        match events.next() {
            Ok(event) => handle_event(app, event, command_tx),
            Err(e) => warn!(error = %e, "Failed to read terminal event"),
        }

        // 4. UPDATE
        app.tick(Utc::now());
    }

    Ok(())
}

fn apply_result(app: &mut App, result: AppResult) {
    match result {
        AppResult::SegmentLoaded { generation, report } => {
            debug!(generation, close = report.snapshot.close, "Applying segment report");
            app.apply_report(generation, report, Utc::now());
        }
        AppResult::PollFailed { generation, error } => {
            app.apply_poll_failure(generation, error);
        }
        AppResult::AccountLoaded(funds) => app.apply_account(funds),
        AppResult::AccountFailed(_) => app.apply_account_failure(),
        AppResult::WalletLoaded { address, balances } => {
            app.apply_wallet(address, balances);
        }
        AppResult::WalletFailed { address, error } => {
            debug!(%error, "Applying wallet failure");
            app.apply_wallet_failure(address);
        }
    }
}

// ============================================================================
// Gestion des événements
// ============================================================================

fn handle_event(app: &mut App, event: Event, command_tx: &mpsc::Sender<AppCommand>) {
    use candlewatch::ui::events::{
        get_char_from_event, is_address_char_event, is_amount_char_event, is_backspace_event,
        is_enter_event, is_escape_event, is_mode_toggle_event, is_quit_event, is_refresh_event,
        is_toggle_view_event,
    };

    match event {
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) if is_toggle_view_event(&event) => {
            app.cancel_quit();
            let view = app.toggle_view();
            debug!(?view, "User switched view");

            // Retour au graphique : données fraîches sans attendre le cycle
            if app.is_on_chart() {
                send_command(command_tx, AppCommand::Refresh);
            }
        }

        Event::Key(_) if is_refresh_event(&event) && app.is_on_chart() => {
            app.cancel_quit();
            info!("User requested refresh");
            send_command(command_tx, AppCommand::Refresh);
        }

        // ========================================
        // Vue Rewards : saisie d'adresse
        // ========================================
        Event::Key(_) if is_enter_event(&event) && app.is_on_rewards() => {
            app.cancel_quit();
            if let Some(address) = app.submit_address() {
                send_command(command_tx, AppCommand::LookupAccount { address });
                send_command(command_tx, AppCommand::LookupWallet { address });
            }
        }

        Event::Key(_) if is_escape_event(&event) && app.is_on_rewards() => {
            app.cancel_quit();
            app.clear_input();
        }

        Event::Key(_) if is_backspace_event(&event) && app.is_on_rewards() => {
            app.cancel_quit();
            app.backspace();
        }

        Event::Key(_) if is_address_char_event(&event) && app.is_on_rewards() => {
            app.cancel_quit();
            if let Some(c) = get_char_from_event(&event) {
                app.append_char(c);
            }
        }

        // ========================================
        // Vue Wrap : montant et sens de conversion
        // ========================================
        Event::Key(_) if is_mode_toggle_event(&event) && app.is_on_wrap() => {
            app.cancel_quit();
            let mode = app.toggle_wrap_mode();
            debug!(?mode, "User switched wrap mode");
        }

        Event::Key(_) if is_escape_event(&event) && app.is_on_wrap() => {
            app.cancel_quit();
            app.clear_amount();
        }

        Event::Key(_) if is_backspace_event(&event) && app.is_on_wrap() => {
            app.cancel_quit();
            app.amount_backspace();
        }

        Event::Key(_) if is_amount_char_event(&event) && app.is_on_wrap() => {
            app.cancel_quit();
            if let Some(c) = get_char_from_event(&event) {
                app.append_amount_char(c);
            }
        }

        Event::Resize(columns, rows) => {
            // La surface est remesurée au début de l'itération suivante
            debug!(columns, rows, "Terminal resized");
        }

        Event::Tick => {}

        Event::Key(_) => {
            app.cancel_quit();
        }
    }
}

fn send_command(command_tx: &mpsc::Sender<AppCommand>, command: AppCommand) {
    if let Err(e) = command_tx.send(command) {
        error!(error = %e, "Failed to send command to worker");
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

/// Restaure le terminal, appelé même si la boucle a échoué
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
