// ============================================================================
// Gestion des événements
// ============================================================================
// Lit les événements du terminal (clavier, redimensionnement) et fournit
// des helpers pour les classer
//
// CONCEPTS RUST :
// 1. Enums avec variants : Key, Resize, Tick
// 2. Pattern matching avec guards : matches!(code, KeyCode::Char(c) if ...)
// 3. Error handling avec Result
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind};

/// Événements de l'application
#[derive(Debug, Clone)]
pub enum Event {
    /// Touche pressée
    Key(KeyEvent),

    /// Terminal redimensionné (colonnes, lignes)
    ///
    /// La surface de rendu doit être remesurée puis redessinée.
    Resize(u16, u16),

    /// Aucun événement pendant le timeout : met à jour la progression
    Tick,
}

/// Gestionnaire d'événements
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    /// Lit le prochain événement (bloquant au plus `tick_rate`)
    pub fn next(&self) -> Result<Event> {
        if !event::poll(self.tick_rate)? {
            return Ok(Event::Tick);
        }

        let event = match event::read()? {
            // Sur certains OS on reçoit Press ET Release : on ne garde que Press
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Event::Key(key),
            CrosstermEvent::Resize(columns, rows) => Event::Resize(columns, rows),
            _ => Event::Tick,
        };

        Ok(event)
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

// ============================================================================
// Helpers : classer un événement clavier
// ============================================================================

fn key_code(event: &Event) -> Option<KeyCode> {
    match event {
        Event::Key(key) => Some(key.code),
        _ => None,
    }
}

/// 'q' : quitter (deux pressions)
pub fn is_quit_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('q') | KeyCode::Char('Q')))
}

pub fn is_escape_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Esc))
}

pub fn is_enter_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Enter))
}

pub fn is_backspace_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Backspace))
}

/// Tab : passe à la vue suivante (Chart -> Rewards -> Wrap)
pub fn is_toggle_view_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Tab))
}

/// 'r' : relance immédiate d'un cycle de polling
pub fn is_refresh_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('r') | KeyCode::Char('R')))
}

/// Caractère acceptable dans une adresse : hexadécimal ou le 'x' de "0x"
pub fn is_address_char_event(event: &Event) -> bool {
    matches!(
        key_code(event),
        Some(KeyCode::Char(c)) if c.is_ascii_hexdigit() || c == 'x' || c == 'X'
    )
}

/// Caractère acceptable dans un montant : chiffre ou séparateur décimal
pub fn is_amount_char_event(event: &Event) -> bool {
    matches!(
        key_code(event),
        Some(KeyCode::Char(c)) if c.is_ascii_digit() || c == '.'
    )
}

/// 'm' : bascule wrap / unwrap
pub fn is_mode_toggle_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('m') | KeyCode::Char('M')))
}

/// Extrait le caractère d'un événement clavier
pub fn get_char_from_event(event: &Event) -> Option<char> {
    match key_code(event) {
        Some(KeyCode::Char(c)) => Some(c),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::empty()))
    }

    #[test]
    fn test_is_quit_event() {
        assert!(is_quit_event(&key(KeyCode::Char('q'))));
        assert!(!is_quit_event(&key(KeyCode::Char('a'))));
        assert!(!is_quit_event(&Event::Tick));
    }

    #[test]
    fn test_address_chars() {
        assert!(is_address_char_event(&key(KeyCode::Char('0'))));
        assert!(is_address_char_event(&key(KeyCode::Char('x'))));
        assert!(is_address_char_event(&key(KeyCode::Char('F'))));
        assert!(!is_address_char_event(&key(KeyCode::Char('g'))));
        assert!(!is_address_char_event(&key(KeyCode::Char('q'))));
        assert!(!is_address_char_event(&Event::Resize(80, 24)));
    }

    #[test]
    fn test_amount_chars() {
        assert!(is_amount_char_event(&key(KeyCode::Char('7'))));
        assert!(is_amount_char_event(&key(KeyCode::Char('.'))));
        assert!(!is_amount_char_event(&key(KeyCode::Char('a'))));
        assert!(!is_amount_char_event(&key(KeyCode::Char('-'))));
        assert!(is_mode_toggle_event(&key(KeyCode::Char('m'))));
    }

    #[test]
    fn test_toggle_and_refresh() {
        assert!(is_toggle_view_event(&key(KeyCode::Tab)));
        assert!(is_refresh_event(&key(KeyCode::Char('r'))));
        assert!(!is_refresh_event(&key(KeyCode::Enter)));
    }

    #[test]
    fn test_get_char_from_event() {
        assert_eq!(get_char_from_event(&key(KeyCode::Char('b'))), Some('b'));
        assert_eq!(get_char_from_event(&key(KeyCode::Enter)), None);
        assert_eq!(get_char_from_event(&Event::Tick), None);
    }
}
