//! Wallet address parsing and classification.

use crate::chain::ChainFamily;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Default cap on wallets per request.
pub const DEFAULT_MAX_WALLETS: usize = 15;

const EVM_HEX_LEN: usize = 40;
const SOLANA_MIN_LEN: usize = 32;
const SOLANA_MAX_LEN: usize = 44;
const SOLANA_PUBKEY_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("EVM address must be 0x followed by 40 hex characters")]
    InvalidEvm,
    #[error("not a valid EVM or Solana address")]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressListError {
    #[error("no addresses given")]
    Empty,
    #[error("too many addresses: {count} given, at most {max} allowed")]
    TooMany { count: usize, max: usize },
}

/// A validated wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletAddress {
    /// Lower-cased `0x`-prefixed hex address.
    Evm(String),
    /// Base58 encoded ed25519 public key.
    Solana(String),
}

impl WalletAddress {
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(body) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
            if body.len() != EVM_HEX_LEN || hex::decode(body).is_err() {
                return Err(AddressError::InvalidEvm);
            }
            return Ok(WalletAddress::Evm(format!("0x{}", body.to_ascii_lowercase())));
        }

        if (SOLANA_MIN_LEN..=SOLANA_MAX_LEN).contains(&input.len()) {
            if let Ok(bytes) = bs58::decode(input).into_vec() {
                if bytes.len() == SOLANA_PUBKEY_BYTES {
                    return Ok(WalletAddress::Solana(input.to_string()));
                }
            }
        }

        Err(AddressError::Unrecognized)
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            WalletAddress::Evm(_) => ChainFamily::Evm,
            WalletAddress::Solana(_) => ChainFamily::Solana,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WalletAddress::Evm(s) | WalletAddress::Solana(s) => s,
        }
    }

    /// Abbreviated form for chat display, e.g. `0xab12…cd34`.
    pub fn short(&self) -> String {
        shorten(self.as_str())
    }

    /// Compare with an address string as reported by an explorer.
    pub fn matches(&self, other: &str) -> bool {
        match self {
            WalletAddress::Evm(s) => s.eq_ignore_ascii_case(other),
            WalletAddress::Solana(s) => s == other,
        }
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorten any identifier to `first6…last4`.
pub fn shorten(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 12 {
        return s.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// One token of user input after splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    /// 1-based position among distinct inputs.
    pub index: usize,
    pub input: String,
    pub parsed: Result<WalletAddress, AddressError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedAddresses {
    pub entries: Vec<AddressEntry>,
}

impl ParsedAddresses {
    pub fn valid(&self) -> impl Iterator<Item = (usize, &WalletAddress)> {
        self.entries
            .iter()
            .filter_map(|e| e.parsed.as_ref().ok().map(|a| (e.index, a)))
    }

    pub fn invalid(&self) -> impl Iterator<Item = &AddressEntry> {
        self.entries.iter().filter(|e| e.parsed.is_err())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a comma/whitespace separated list of addresses.
///
/// Duplicates are dropped (EVM compared case-insensitively) keeping the
/// first occurrence. Invalid tokens are kept as entries with an error so
/// the reply can point at them; only an empty list or one longer than
/// `max` fails as a whole.
pub fn parse_address_list(input: &str, max: usize) -> Result<ParsedAddresses, AddressListError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        let parsed = WalletAddress::parse(token);
        let key = match &parsed {
            Ok(addr) => addr.as_str().to_string(),
            Err(_) => token.to_string(),
        };
        if !seen.insert(key) {
            continue;
        }
        entries.push(AddressEntry {
            index: entries.len() + 1,
            input: token.to_string(),
            parsed,
        });
    }

    if entries.is_empty() {
        return Err(AddressListError::Empty);
    }
    if entries.len() > max {
        return Err(AddressListError::TooMany {
            count: entries.len(),
            max,
        });
    }

    Ok(ParsedAddresses { entries })
}
