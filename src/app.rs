// ============================================================================
// Structure : App
// ============================================================================
// État de l'interface, possédé par le thread UI
//
// PATTERN : "Application State"
// - Les vues lisent depuis App
// - Les résultats du worker passent par les méthodes apply_* de App
// - Le renderer (et sa surface) vit ici : render/resize s'exécutent
//   entièrement sur le thread UI, jamais en concurrence
//
// CONCEPT : Générations de polling
// - Chaque cycle du worker porte un numéro croissant
// - Un résultat plus ancien que le dernier appliqué est ignoré : un cycle
//   lent ne peut pas écraser un cycle plus récent
// ============================================================================

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::abi;
use crate::api::SegmentReport;
use crate::models::{
    format_balance, format_gwei, AccountFunds, Band, PriceSnapshot, Segment, SegmentProgress,
    WalletBalances, WrapMode, WrapState, TOKEN_DECIMALS,
};
use crate::ui::candle::{CandleRenderer, RenderConfig};
use crate::ui::surface::{RecordingSurface, RenderSurface, Size};

/// Message affiché quand l'adresse saisie est invalide
pub const INVALID_ADDRESS: &str = "invalid address";

/// Message affiché pendant la lecture des fonds
pub const LOADING: &str = "loading...";

/// Message affiché quand la lecture des fonds échoue
pub const NETWORK_ERROR: &str = "network error, please try again later..";

/// Vues de l'application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Chandelier du segment courant
    Chart,

    /// Fonds verrouillés et contributions d'une adresse
    Rewards,

    /// Conversion token <-> token wrappé pour l'adresse consultée
    Wrap,
}

/// Variante visuelle d'un message de statut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Message de statut de la vue Rewards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Two-step quit : première pression de 'q' = confirmation demandée
    pub confirm_quit: bool,

    pub current_view: View,

    renderer: CandleRenderer<RecordingSurface>,

    /// Bandes configurées (None = ticks fixes)
    bands: Option<Vec<Band>>,

    /// Dernier segment appliqué
    pub segment: Option<Segment>,

    /// Timestamp du bloc marqueur
    pub started_at: Option<DateTime<Utc>>,

    pub latest_block: Option<u64>,

    /// Avancement recalculé à chaque tick
    pub progress: Option<SegmentProgress>,

    /// Génération du dernier résultat de polling appliqué
    last_generation: Option<u64>,

    /// Dernière erreur de polling (loggée, affichée discrètement)
    pub last_poll_error: Option<String>,

    /// Adresse en cours de saisie (vue Rewards)
    pub input_buffer: String,

    pub status: Option<Status>,

    /// Dernière adresse validée, partagée par les vues Rewards et Wrap
    pub wallet_address: Option<[u8; 20]>,

    pub wallet: Option<WalletBalances>,

    pub wallet_status: Option<Status>,

    pub wrap_mode: WrapMode,

    /// Montant en cours de saisie (vue Wrap)
    pub amount_buffer: String,
}

impl App {
    /// Crée l'état initial, renderer non lié (aucun snapshot)
    pub fn new(render_config: RenderConfig, bands: Option<Vec<Band>>) -> Self {
        Self {
            running: true,
            confirm_quit: false,
            current_view: View::Chart,
            renderer: CandleRenderer::configure(RecordingSurface::default(), render_config),
            bands,
            segment: None,
            started_at: None,
            latest_block: None,
            progress: None,
            last_generation: None,
            last_poll_error: None,
            input_buffer: String::new(),
            status: None,
            wallet_address: None,
            wallet: None,
            wallet_status: None,
            wrap_mode: WrapMode::Wrap,
            amount_buffer: String::new(),
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    // ========================================================================
    // Vues
    // ========================================================================

    /// Passe à la vue suivante et la retourne
    pub fn toggle_view(&mut self) -> View {
        self.current_view = match self.current_view {
            View::Chart => View::Rewards,
            View::Rewards => View::Wrap,
            View::Wrap => View::Chart,
        };
        self.current_view
    }

    pub fn is_on_chart(&self) -> bool {
        self.current_view == View::Chart
    }

    pub fn is_on_rewards(&self) -> bool {
        self.current_view == View::Rewards
    }

    pub fn is_on_wrap(&self) -> bool {
        self.current_view == View::Wrap
    }

    // ========================================================================
    // Renderer
    // ========================================================================

    pub fn renderer(&self) -> &CandleRenderer<RecordingSurface> {
        &self.renderer
    }

    /// Synchronise la surface avec la boîte de layout de la zone graphique
    ///
    /// Retourne true si un resize a eu lieu (le dernier snapshot est alors
    /// redessiné aux nouvelles dimensions).
    pub fn sync_layout(&mut self, layout: Size) -> bool {
        if self.renderer.surface().size() == layout {
            return false;
        }

        debug!(width = layout.width, height = layout.height, "Chart area resized");
        self.renderer.surface_mut().set_layout(layout);
        self.renderer.resize();
        true
    }

    // ========================================================================
    // Résultats du worker
    // ========================================================================

    fn is_stale(&self, generation: u64) -> bool {
        self.last_generation.is_some_and(|last| generation < last)
    }

    /// Applique un cycle de polling réussi
    ///
    /// Retourne false si le résultat est périmé et a été ignoré.
    pub fn apply_report(&mut self, generation: u64, report: SegmentReport, now: DateTime<Utc>) -> bool {
        if self.is_stale(generation) {
            warn!(generation, last = ?self.last_generation, "Ignoring stale segment report");
            return false;
        }

        self.last_generation = Some(generation);
        self.last_poll_error = None;
        self.segment = Some(report.segment);
        self.started_at = Some(report.started_at);
        self.latest_block = Some(report.latest_block);
        self.progress = Some(SegmentProgress::at(report.started_at, now));

        let snapshot = self.decorate(report.snapshot);
        self.renderer.render(snapshot);
        true
    }

    /// Ajoute les bandes configurées et marque la bande active
    fn decorate(&self, snapshot: PriceSnapshot) -> PriceSnapshot {
        match &self.bands {
            Some(bands) => {
                let mut snapshot = snapshot.with_bands(bands.clone());
                snapshot.activate_bands();
                snapshot
            }
            None => snapshot,
        }
    }

    /// Enregistre l'échec d'un cycle ; la dernière frame reste affichée
    pub fn apply_poll_failure(&mut self, generation: u64, error: String) -> bool {
        if self.is_stale(generation) {
            return false;
        }

        self.last_generation = Some(generation);
        self.last_poll_error = Some(error);
        true
    }

    /// Tick UI : met à jour l'avancement du segment
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(started_at) = self.started_at {
            self.progress = Some(SegmentProgress::at(started_at, now));
        }
    }

    // ========================================================================
    // Vue Rewards : saisie d'adresse
    // ========================================================================

    pub fn append_char(&mut self, c: char) {
        self.input_buffer.push(c);
    }

    pub fn backspace(&mut self) {
        self.input_buffer.pop();
    }

    pub fn clear_input(&mut self) {
        self.input_buffer.clear();
        self.status = None;
    }

    /// Valide l'adresse saisie
    ///
    /// Adresse valide : statut "loading..." et l'adresse décodée à envoyer au
    /// worker. Sinon : statut "invalid address" et None.
    pub fn submit_address(&mut self) -> Option<[u8; 20]> {
        match abi::parse_address(self.input_buffer.trim()) {
            Ok(address) => {
                info!(address = %self.input_buffer.trim(), "Looking up account funds");
                self.status = Some(Status::new(LOADING, StatusKind::Info));
                self.wallet_address = Some(address);
                self.wallet = None;
                self.wallet_status = Some(Status::new(LOADING, StatusKind::Info));
                Some(address)
            }
            Err(e) => {
                debug!(error = %e, "Rejected address input");
                self.status = Some(Status::new(INVALID_ADDRESS, StatusKind::Error));
                None
            }
        }
    }

    pub fn apply_account(&mut self, funds: AccountFunds) {
        let text = format!(
            "locked: {} gwei | contributions: {} gwei",
            format_gwei(funds.locked),
            format_gwei(funds.contributions)
        );
        self.status = Some(Status::new(text, StatusKind::Success));
    }

    pub fn apply_account_failure(&mut self) {
        self.status = Some(Status::new(NETWORK_ERROR, StatusKind::Error));
    }

    // ========================================================================
    // Vue Wrap : soldes et montant
    // ========================================================================

    /// Applique les soldes lus pour `address`
    ///
    /// Retourne false si une autre adresse a été validée entre-temps.
    pub fn apply_wallet(&mut self, address: [u8; 20], balances: WalletBalances) -> bool {
        if self.wallet_address != Some(address) {
            warn!("Ignoring wallet balances for a previous address");
            return false;
        }

        self.wallet = Some(balances);
        self.wallet_status = None;
        true
    }

    pub fn apply_wallet_failure(&mut self, address: [u8; 20]) -> bool {
        if self.wallet_address != Some(address) {
            return false;
        }

        self.wallet_status = Some(Status::new(NETWORK_ERROR, StatusKind::Error));
        true
    }

    pub fn toggle_wrap_mode(&mut self) -> WrapMode {
        self.wrap_mode = self.wrap_mode.toggle();
        self.wrap_mode
    }

    pub fn append_amount_char(&mut self, c: char) {
        self.amount_buffer.push(c);
    }

    pub fn amount_backspace(&mut self) {
        self.amount_buffer.pop();
    }

    pub fn clear_amount(&mut self) {
        self.amount_buffer.clear();
    }

    /// Action proposée pour le montant saisi
    ///
    /// None tant que les soldes ne sont pas connus ou que le montant n'est
    /// pas un nombre valide.
    pub fn wrap_state(&self) -> Option<WrapState> {
        let balances = self.wallet.as_ref()?;
        let amount = abi::parse_units(&self.amount_buffer, TOKEN_DECIMALS)?;
        Some(WrapState::decide(self.wrap_mode, amount, balances))
    }

    /// Solde source du mode courant, "balance: 1.2345"
    pub fn wallet_balance_text(&self) -> Option<String> {
        self.wallet
            .map(|balances| format_balance(balances.source_balance(self.wrap_mode)))
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_bands;
    use crate::ui::surface::DrawCommand;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap()
    }

    fn report(close: f64) -> SegmentReport {
        SegmentReport {
            segment: Segment::new(1_000, 10.0, 9.5),
            latest_block: 1_500,
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            snapshot: PriceSnapshot::new(9.5, 10.4, 9.2, close, 10.0),
        }
    }

    fn app() -> App {
        let mut app = App::new(RenderConfig::default(), None);
        app.sync_layout(Size::new(800, 480));
        app
    }

    #[test]
    fn test_app_creation() {
        let app = App::new(RenderConfig::default(), None);
        assert!(app.is_running());
        assert!(app.is_on_chart());
        assert!(app.renderer().last_snapshot().is_none());
    }

    #[test]
    fn test_two_step_quit() {
        let mut app = app();
        app.request_quit();
        assert!(app.is_awaiting_quit_confirmation());
        app.cancel_quit();
        assert!(!app.is_awaiting_quit_confirmation());
        app.quit();
        assert!(!app.is_running());
    }

    #[test]
    fn test_toggle_view() {
        let mut app = app();
        assert_eq!(app.toggle_view(), View::Rewards);
        assert!(app.is_on_rewards());
        assert_eq!(app.toggle_view(), View::Wrap);
        assert!(app.is_on_wrap());
        assert_eq!(app.toggle_view(), View::Chart);
    }

    #[test]
    fn test_apply_report_renders() {
        let mut app = app();
        assert!(app.apply_report(1, report(9.9), now()));

        assert_eq!(app.latest_block, Some(1_500));
        assert_eq!(app.renderer().last_snapshot().map(|s| s.close), Some(9.9));
        assert!(!app.renderer().surface().commands().is_empty());
        assert_eq!(
            app.progress,
            Some(SegmentProgress::Running {
                elapsed: 600,
                remaining: 3_000
            })
        );
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut app = app();
        assert!(app.apply_report(2, report(9.9), now()));
        assert!(!app.apply_report(1, report(9.3), now()));
        assert_eq!(app.renderer().last_snapshot().map(|s| s.close), Some(9.9));

        assert!(!app.apply_poll_failure(1, "late".to_string()));
        assert!(app.last_poll_error.is_none());

        assert!(app.apply_poll_failure(3, "timeout".to_string()));
        assert_eq!(app.last_poll_error.as_deref(), Some("timeout"));
        // La frame précédente reste en place
        assert_eq!(app.renderer().last_snapshot().map(|s| s.close), Some(9.9));
    }

    #[test]
    fn test_bands_are_activated() {
        let mut app = App::new(RenderConfig::default(), Some(default_bands()));
        app.sync_layout(Size::new(800, 480));
        // 9.9 : 1% sous la cible -> deuxième bande
        app.apply_report(1, report(9.9), now());

        let active: Vec<bool> = app
            .renderer()
            .last_snapshot()
            .and_then(|s| s.bands.as_ref())
            .map(|bands| bands.iter().map(|b| b.active).collect())
            .unwrap_or_default();
        assert_eq!(active, vec![false, true, false]);

        let polygons = app
            .renderer()
            .surface()
            .commands()
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::Polygon { .. }))
            .count();
        assert_eq!(polygons, 6);
    }

    #[test]
    fn test_sync_layout_replays_snapshot() {
        let mut app = app();
        app.apply_report(1, report(9.9), now());

        assert!(!app.sync_layout(Size::new(800, 480)));
        assert!(app.sync_layout(Size::new(400, 240)));
        assert_eq!(app.renderer().surface().size(), Size::new(400, 240));
        // Étiquettes sans préfixe sous 640 px
        assert!(app.renderer().surface().texts().contains(&"10.0000"));
    }

    #[test]
    fn test_tick_updates_progress() {
        let mut app = app();
        app.tick(now());
        assert!(app.progress.is_none());

        app.apply_report(1, report(9.9), now());
        app.tick(now() + chrono::Duration::minutes(55));
        assert_eq!(app.progress.map(|p| p.is_pending()), Some(true));
    }

    #[test]
    fn test_submit_invalid_address() {
        let mut app = app();
        for c in "0x12".chars() {
            app.append_char(c);
        }

        assert!(app.submit_address().is_none());
        assert_eq!(
            app.status,
            Some(Status::new(INVALID_ADDRESS, StatusKind::Error))
        );
    }

    #[test]
    fn test_submit_valid_address_then_result() {
        let mut app = app();
        app.input_buffer = "0xDa915F510Daf9Bf404915E651EeDcE46Dcb8Fe7e".to_string();

        let address = app.submit_address().unwrap();
        assert_eq!(address[0], 0xda);
        assert_eq!(app.status, Some(Status::new(LOADING, StatusKind::Info)));

        app.apply_account(AccountFunds::new(1.5, 0.25));
        assert_eq!(
            app.status.as_ref().map(|s| s.text.as_str()),
            Some("locked: 1.500 gwei | contributions: 0.250 gwei")
        );

        app.apply_account_failure();
        assert_eq!(
            app.status,
            Some(Status::new(NETWORK_ERROR, StatusKind::Error))
        );
    }

    #[test]
    fn test_backspace_and_clear() {
        let mut app = app();
        app.append_char('0');
        app.append_char('x');
        app.backspace();
        assert_eq!(app.input_buffer, "0");

        app.status = Some(Status::new(LOADING, StatusKind::Info));
        app.clear_input();
        assert!(app.input_buffer.is_empty());
        assert!(app.status.is_none());
    }

    const ONE: u128 = 1_000_000_000_000_000_000;
    const OWNER: &str = "0xDa915F510Daf9Bf404915E651EeDcE46Dcb8Fe7e";

    fn app_with_wallet() -> (App, [u8; 20]) {
        let mut app = app();
        app.input_buffer = OWNER.to_string();
        let address = app.submit_address().unwrap();
        (app, address)
    }

    #[test]
    fn test_wrap_state_follows_amount() {
        let (mut app, address) = app_with_wallet();
        assert_eq!(app.wallet_status, Some(Status::new(LOADING, StatusKind::Info)));

        app.amount_buffer = "2".to_string();
        assert_eq!(app.wrap_state(), None);

        assert!(app.apply_wallet(
            address,
            WalletBalances {
                token: 10 * ONE,
                wrapped: ONE,
                allowance: 3 * ONE,
            },
        ));
        assert!(app.wallet_status.is_none());
        assert_eq!(app.wallet_balance_text().as_deref(), Some("balance: 10.0000"));
        assert_eq!(app.wrap_state(), Some(WrapState::SendTransaction));

        app.append_amount_char('5');
        assert_eq!(app.wrap_state(), Some(WrapState::InsufficientBalance));
        app.amount_backspace();
        app.amount_buffer = "4.5".to_string();
        assert_eq!(app.wrap_state(), Some(WrapState::Approve));

        assert_eq!(app.toggle_wrap_mode(), WrapMode::Unwrap);
        assert_eq!(app.wallet_balance_text().as_deref(), Some("balance: 1.0000"));
        assert_eq!(app.wrap_state(), Some(WrapState::InsufficientBalance));

        app.amount_buffer = "abc".to_string();
        assert_eq!(app.wrap_state(), None);
        app.clear_amount();
        assert!(app.amount_buffer.is_empty());
    }

    #[test]
    fn test_wallet_result_for_previous_address_ignored() {
        let (mut app, address) = app_with_wallet();
        let other = [0x22u8; 20];

        assert!(!app.apply_wallet(other, WalletBalances::default()));
        assert!(app.wallet.is_none());
        assert!(!app.apply_wallet_failure(other));

        assert!(app.apply_wallet_failure(address));
        assert_eq!(
            app.wallet_status,
            Some(Status::new(NETWORK_ERROR, StatusKind::Error))
        );
    }
}
