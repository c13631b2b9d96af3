// ============================================================================
// ABI : décodage des payloads de logs
// ============================================================================
// Les logs Ethereum transportent des mots de 32 octets big-endian.
// Les prix sont des nombres à virgule fixe (N décimales) stockés en uint256.
//
// CONCEPT RUST : Slices
// - &[u8] : vue empruntée sur les octets, aucune copie
// - chunks/split_at : découpage sans allocation
// ============================================================================

use crate::error::ChainError;

/// Taille d'un mot ABI en octets
pub const WORD_SIZE: usize = 32;

/// Nombre de mots dans le payload du marqueur "Segment"
pub const SEGMENT_WORDS: usize = 7;

/// Index du prix de clôture du segment précédent dans le marqueur
pub const SEGMENT_CLOSE_WORD: usize = 3;

/// Index du prix cible dans le marqueur
pub const SEGMENT_TARGET_WORD: usize = 6;

/// Sélecteur de `lockedFunds(address)`
pub const LOCKED_FUNDS_SELECTOR: [u8; 4] = [0xb8, 0x62, 0x47, 0xd7];

/// Sélecteur de `contributions(address)`
pub const CONTRIBUTIONS_SELECTOR: [u8; 4] = [0x42, 0xe9, 0x4c, 0x90];

/// Sélecteur ERC-20 `balanceOf(address)`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Sélecteur ERC-20 `allowance(address,address)`
pub const ALLOWANCE_SELECTOR: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];

/// Décode une chaîne hexadécimale (avec ou sans préfixe 0x)
pub fn decode_hex(input: &str) -> Result<Vec<u8>, ChainError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    hex::decode(digits).map_err(|e| ChainError::Decode(format!("invalid hex {:?}: {}", input, e)))
}

/// Encode des octets en hexadécimal préfixé par 0x
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse une "quantity" JSON-RPC ("0x1b4") en u64
pub fn parse_quantity(input: &str) -> Result<u64, ChainError> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(format!("invalid quantity {:?}: {}", input, e)))
}

/// Formate un u64 en "quantity" JSON-RPC
pub fn to_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

/// Retourne le mot `index` du payload
///
/// Un payload trop court est une erreur : lire au mauvais offset donnerait
/// des prix faux sans le moindre signal.
pub fn word(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index * WORD_SIZE;
    data.get(start..start + WORD_SIZE).ok_or_else(|| {
        ChainError::Decode(format!(
            "payload of {} bytes has no word {}",
            data.len(),
            index
        ))
    })
}

/// Convertit un entier big-endian à virgule fixe en f64
///
/// Équivalent de `parseFloat(formatUnits(value, decimals))`.
/// Tant que la valeur tient sur 128 bits, la partie entière et la partie
/// fractionnaire sont séparées avant conversion pour limiter les arrondis.
pub fn format_units(word: &[u8], decimals: u32) -> f64 {
    let split = word.len().saturating_sub(16);
    let (high, low) = word.split_at(split);

    if high.iter().all(|b| *b == 0) {
        let raw = low.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
        if let Some(scale) = 10u128.checked_pow(decimals) {
            return (raw / scale) as f64 + (raw % scale) as f64 / scale as f64;
        }
    }

    let raw = word.iter().fold(0.0_f64, |acc, b| acc * 256.0 + f64::from(*b));
    raw / 10f64.powi(decimals as i32)
}

/// Mot ABI en unités brutes, saturé à u128::MAX
///
/// Une allowance "infinie" (2^256 - 1) dépasse u128 : elle reste plus grande
/// que tout montant saisi, ce qui suffit aux comparaisons.
pub fn raw_units(word: &[u8]) -> u128 {
    let split = word.len().saturating_sub(16);
    let (high, low) = word.split_at(split);

    if high.iter().any(|b| *b != 0) {
        return u128::MAX;
    }
    low.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b))
}

/// Parse un montant décimal ("1.5") en unités brutes à `decimals` décimales
///
/// Refuse les montants vides, négatifs, ou plus précis que `decimals`.
pub fn parse_units(input: &str, decimals: u32) -> Option<u128> {
    let input = input.trim();
    let (whole, fraction) = input.split_once('.').unwrap_or((input, ""));

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > decimals as usize {
        return None;
    }

    let scale = 10u128.checked_pow(decimals)?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128.checked_pow(decimals - fraction.len() as u32)?;
        fraction.parse::<u128>().ok()?.checked_mul(padding)?
    };

    whole.checked_mul(scale)?.checked_add(fraction)
}

/// Valide une adresse : exactement 20 octets en hexadécimal
pub fn parse_address(input: &str) -> Result<[u8; 20], ChainError> {
    let bytes = decode_hex(input.trim())?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| {
            ChainError::Decode(format!("address must be 20 bytes, got {}", bytes.len()))
        })
}

/// Encode l'appel d'une vue `fn(address)` : sélecteur + adresse paddée à 32 octets
pub fn encode_address_call(selector: [u8; 4], address: &[u8; 20]) -> Vec<u8> {
    encode_addresses_call(selector, &[address])
}

/// Encode l'appel d'une vue à plusieurs arguments `address`
pub fn encode_addresses_call(selector: [u8; 4], addresses: &[&[u8; 20]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD_SIZE * addresses.len());
    data.extend_from_slice(&selector);
    for address in addresses {
        data.extend_from_slice(&[0u8; WORD_SIZE - 20]);
        data.extend_from_slice(*address);
    }
    data
}
