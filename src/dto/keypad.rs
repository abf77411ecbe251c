use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dto::validation::validate_keypad_id,
    state::game::{Indicator, Pattern},
};

#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
/// Messages accepted from keypad WebSocket clients.
#[serde(tag = "type")]
pub enum KeypadInboundMessage {
    /// First frame of every connection.
    #[serde(rename = "identification")]
    Identification {
        /// Stable keypad identifier.
        id: String,
    },
    /// One raw key press.
    #[serde(rename = "key")]
    Key {
        /// Scancode of the pressed key.
        scancode: u16,
    },
}

/// Rejection reasons for an inbound keypad frame.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Not JSON, or not one of the known message shapes.
    #[error("malformed keypad message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Well-formed but carrying an unacceptable value.
    #[error("invalid keypad message: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl KeypadInboundMessage {
    /// Parse a text frame and validate its contents.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let message: Self = serde_json::from_str(text)?;
        if let Self::Identification { id } = &message {
            if let Err(err) = validate_keypad_id(id) {
                let mut errors = ValidationErrors::new();
                errors.add("id", err);
                return Err(errors.into());
            }
        }
        Ok(message)
    }
}

/// Indicator name as shown on the wire.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorName {
    /// Bit 0.
    NumLock,
    /// Bit 1.
    CapsLock,
    /// Bit 2.
    ScrollLock,
}

impl From<Indicator> for IndicatorName {
    fn from(value: Indicator) -> Self {
        match value {
            Indicator::NumLock => IndicatorName::NumLock,
            Indicator::CapsLock => IndicatorName::CapsLock,
            Indicator::ScrollLock => IndicatorName::ScrollLock,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to keypad WebSocket clients.
#[serde(tag = "type")]
pub enum KeypadOutboundMessage {
    /// Light exactly the listed indicators.
    #[serde(rename = "indicators")]
    Indicators {
        /// Pattern bits (0 to 7).
        pattern: u8,
        /// Lit indicators in bit order.
        lit: Vec<IndicatorName>,
    },
}

impl From<Pattern> for KeypadOutboundMessage {
    fn from(pattern: Pattern) -> Self {
        Self::Indicators {
            pattern: pattern.bits(),
            lit: pattern.lit().map(IndicatorName::from).collect(),
        }
    }
}
