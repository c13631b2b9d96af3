// ============================================================================
// Structure : WalletBalances + décision wrap / unwrap
// ============================================================================
// Soldes d'une adresse pour le token et sa version wrappée, plus l'allowance
// accordée au contrat wrappé. La décision d'action est une fonction pure :
// la vue n'a qu'à afficher le WrapState retourné.
//
// RÈGLES :
// - Wrap   : montant > solde -> solde insuffisant
//            montant <= allowance -> transaction possible
//            sinon -> approve d'abord
// - Unwrap : montant > solde wrappé -> solde insuffisant
//            sinon -> transaction possible (pas d'approve)
// ============================================================================

use crate::api::abi;

/// Décimales du token et de sa version wrappée
pub const TOKEN_DECIMALS: u32 = 18;

/// Soldes lus via eth_call, en unités brutes (18 décimales)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletBalances {
    /// balanceOf(owner) sur le token
    pub token: u128,

    /// balanceOf(owner) sur le token wrappé
    pub wrapped: u128,

    /// allowance(owner, wrapped) sur le token
    pub allowance: u128,
}

/// Sens de la conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Wrap,
    Unwrap,
}

impl WrapMode {
    pub fn toggle(self) -> Self {
        match self {
            WrapMode::Wrap => WrapMode::Unwrap,
            WrapMode::Unwrap => WrapMode::Wrap,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WrapMode::Wrap => "Wrap",
            WrapMode::Unwrap => "Unwrap",
        }
    }
}

/// Action proposée pour un montant donné
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapState {
    /// Montant supérieur au solde : action désactivée
    InsufficientBalance,

    /// Allowance trop faible : approve avant le wrap
    Approve,

    /// Le wrap ou l'unwrap peut être envoyé
    SendTransaction,
}

impl WrapState {
    /// Décide l'action pour `amount` (unités brutes)
    pub fn decide(mode: WrapMode, amount: u128, balances: &WalletBalances) -> Self {
        match mode {
            WrapMode::Wrap if amount > balances.token => WrapState::InsufficientBalance,
            WrapMode::Wrap if amount <= balances.allowance => WrapState::SendTransaction,
            WrapMode::Wrap => WrapState::Approve,
            WrapMode::Unwrap if amount > balances.wrapped => WrapState::InsufficientBalance,
            WrapMode::Unwrap => WrapState::SendTransaction,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WrapState::InsufficientBalance => "INSUFFICIENT BALANCE",
            WrapState::Approve => "APPROVE",
            WrapState::SendTransaction => "SEND TRANSACTION",
        }
    }

    pub fn is_enabled(self) -> bool {
        self != WrapState::InsufficientBalance
    }
}

impl WalletBalances {
    /// Solde source du mode : token pour wrap, token wrappé pour unwrap
    pub fn source_balance(&self, mode: WrapMode) -> u128 {
        match mode {
            WrapMode::Wrap => self.token,
            WrapMode::Unwrap => self.wrapped,
        }
    }
}

/// "balance: 12.3457"
pub fn format_balance(raw: u128) -> String {
    format!(
        "balance: {:.4}",
        abi::format_units(&raw.to_be_bytes(), TOKEN_DECIMALS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn balances() -> WalletBalances {
        WalletBalances {
            token: 10 * ONE,
            wrapped: 3 * ONE,
            allowance: 5 * ONE,
        }
    }

    #[test]
    fn test_wrap_decision() {
        let b = balances();
        assert_eq!(WrapState::decide(WrapMode::Wrap, 11 * ONE, &b), WrapState::InsufficientBalance);
        assert_eq!(WrapState::decide(WrapMode::Wrap, 5 * ONE, &b), WrapState::SendTransaction);
        assert_eq!(WrapState::decide(WrapMode::Wrap, 5 * ONE + 1, &b), WrapState::Approve);
        assert_eq!(WrapState::decide(WrapMode::Wrap, 10 * ONE, &b), WrapState::Approve);
    }

    #[test]
    fn test_unwrap_ignores_allowance() {
        let b = WalletBalances {
            allowance: 0,
            ..balances()
        };
        assert_eq!(WrapState::decide(WrapMode::Unwrap, 3 * ONE, &b), WrapState::SendTransaction);
        assert_eq!(
            WrapState::decide(WrapMode::Unwrap, 3 * ONE + 1, &b),
            WrapState::InsufficientBalance
        );
    }

    #[test]
    fn test_insufficient_balance_wins_over_allowance() {
        // Allowance infinie mais solde vide
        let b = WalletBalances {
            token: 0,
            wrapped: 0,
            allowance: u128::MAX,
        };
        let state = WrapState::decide(WrapMode::Wrap, 1, &b);
        assert_eq!(state, WrapState::InsufficientBalance);
        assert!(!state.is_enabled());
        assert_eq!(state.label(), "INSUFFICIENT BALANCE");
    }

    #[test]
    fn test_mode_toggle_and_source_balance() {
        let b = balances();
        assert_eq!(WrapMode::Wrap.toggle(), WrapMode::Unwrap);
        assert_eq!(b.source_balance(WrapMode::Wrap), 10 * ONE);
        assert_eq!(b.source_balance(WrapMode::Wrap.toggle()), 3 * ONE);
    }

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(ONE + ONE / 8), "balance: 1.1250");
        assert_eq!(format_balance(0), "balance: 0.0000");
    }
}
