use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const ATTO_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// A quantity of payment tokens, counted in attotokens (10^-18 of a whole token).
///
/// Deal pricing works at attotoken granularity (a price per byte of a few atto is
/// common), so the canonical display form is the plain attotoken integer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAmount {
    amount: u128,
}

impl TokenAmount {
    pub const fn zero() -> Self {
        TokenAmount { amount: 0 }
    }

    pub fn from_atto(amount: u128) -> Self {
        TokenAmount { amount }
    }

    pub fn to_atto(&self) -> u128 {
        self.amount
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Creates a new `TokenAmount` from a string representing whole token units.
    /// Returns `None` if the string is not a valid number representation.
    pub fn from_tokens(tokens: &str) -> Option<Self> {
        let mut parts = tokens.split('.');
        let whole = parts.next()?.parse::<u128>().ok()?;
        let fraction = if let Some(frac_str) = parts.next() {
            if parts.next().is_some() {
                return None; // More than one decimal point is invalid
            }
            if frac_str.len() > 18 {
                return None; // More than 18 decimal places is invalid
            }

            // Pad the fractional part with zeros to make it 18 digits
            let mut padded_frac = frac_str.to_string();
            while padded_frac.len() < 18 {
                padded_frac.push('0');
            }

            padded_frac.parse::<u128>().ok()?
        } else {
            0
        };

        let amount = whole.checked_mul(ATTO_PER_TOKEN)?.checked_add(fraction)?;

        Some(TokenAmount { amount })
    }

    pub fn checked_add(&self, other: TokenAmount) -> Option<TokenAmount> {
        self.amount.checked_add(other.amount).map(TokenAmount::from_atto)
    }

    pub fn saturating_add(&self, other: TokenAmount) -> TokenAmount {
        TokenAmount::from_atto(self.amount.saturating_add(other.amount))
    }

    pub fn saturating_sub(&self, other: TokenAmount) -> TokenAmount {
        TokenAmount::from_atto(self.amount.saturating_sub(other.amount))
    }

    /// The total price of `bytes` bytes at this per-byte price. `None` on overflow.
    pub fn checked_mul_bytes(&self, bytes: u64) -> Option<TokenAmount> {
        self.amount.checked_mul(bytes as u128).map(TokenAmount::from_atto)
    }

    /// How many whole bytes this amount covers at the given per-byte price.
    /// A zero price covers no bytes (free retrievals never request payment).
    pub fn full_bytes_at(&self, price_per_byte: TokenAmount) -> u64 {
        if price_per_byte.is_zero() {
            return 0;
        }
        let bytes = self.amount / price_per_byte.amount;
        u64::try_from(bytes).unwrap_or(u64::MAX)
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.amount)
    }
}
