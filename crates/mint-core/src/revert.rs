//! Revert reason decoding
//!
//! Decoding order: structured errors known to the call's error set, then the
//! standard `Error(string)` and `Panic(uint256)` encodings, then the provider's
//! own message.

use ethers::abi::{self, ParamType, Token};
use ethers::utils::id;
use std::fmt;

/// Longest reason text carried into outcomes and logs.
pub const MAX_REASON_LEN: usize = 180;

const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Custom errors raised by the public drop router.
pub const DROP_ROUTER_ERRORS: &[&str] = &[
    "PublicDropInactive()",
    "MintCapExceeded(address)",
    "MintQuantityExceedsMaxMintable()",
    "MintPriceNotMet(uint256,uint256)",
    "MintNotPaid()",
    "MintPaused()",
    "InvalidFeeRecipient()",
];

/// Named group of structured errors a call target may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorSet {
    #[default]
    None,
    DropRouter,
}

impl ErrorSet {
    pub fn signatures(&self) -> &'static [&'static str] {
        match self {
            ErrorSet::None => &[],
            ErrorSet::DropRouter => DROP_ROUTER_ERRORS,
        }
    }

    /// Error name for a selector, if this set declares it.
    pub fn lookup(&self, selector: &[u8]) -> Option<&'static str> {
        self.signatures()
            .iter()
            .copied()
            .find(|signature| id(signature)[..] == *selector)
            .map(|signature| signature.split('(').next().unwrap_or(signature))
    }
}

/// Human-facing explanation of a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    /// Structured error name from the call's error set.
    Custom(String),
    /// `Error(string)` payload.
    Message(String),
    /// `Panic(uint256)` code.
    Panic(u64),
    /// Raw provider text when nothing else could be decoded.
    Unknown(String),
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertReason::Custom(name) => write!(f, "{}", name),
            RevertReason::Message(message) => write!(f, "{}", message),
            RevertReason::Panic(code) => write!(f, "panic code 0x{:x}", code),
            RevertReason::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

impl RevertReason {
    /// Display text clipped to a single line of at most [`MAX_REASON_LEN`] chars.
    pub fn to_short_string(&self) -> String {
        truncate_reason(&self.to_string())
    }
}

/// Decode a revert from its return data and provider message.
pub fn decode_revert(error_set: ErrorSet, data: Option<&[u8]>, message: &str) -> RevertReason {
    if let Some(data) = data.filter(|d| d.len() >= 4) {
        let (selector, payload) = data.split_at(4);

        if let Some(name) = error_set.lookup(selector) {
            return RevertReason::Custom(name.to_string());
        }

        if selector == ERROR_STRING_SELECTOR {
            if let Ok(tokens) = abi::decode(&[ParamType::String], payload) {
                if let Some(Token::String(text)) = tokens.into_iter().next() {
                    return RevertReason::Message(text);
                }
            }
        }

        if selector == PANIC_SELECTOR {
            if let Ok(tokens) = abi::decode(&[ParamType::Uint(256)], payload) {
                if let Some(Token::Uint(code)) = tokens.into_iter().next() {
                    return RevertReason::Panic(code.low_u64());
                }
            }
        }
    }

    RevertReason::Unknown(extract_message(message))
}

/// Provider text after `execution reverted:` when present, else the first line.
fn extract_message(message: &str) -> String {
    let text = match message.split_once("execution reverted:") {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
        _ => message.trim(),
    };
    if text.is_empty() {
        "unknown revert".to_string()
    } else {
        truncate_reason(text)
    }
}

pub fn truncate_reason(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or_default().trim();
    first_line.chars().take(MAX_REASON_LEN).collect()
}
