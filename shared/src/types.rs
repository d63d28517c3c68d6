//! Common types used across the platform

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of an inventory document
///
/// `Done` and `Canceled` are terminal. `Done` is only reachable through the
/// validate operation, never through a direct status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Waiting,
    Ready,
    Done,
    Canceled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Waiting => "waiting",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Done => "done",
            DocumentStatus::Canceled => "canceled",
        }
    }

    /// Terminal statuses block edits and validation
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Done | DocumentStatus::Canceled)
    }

    /// Pending documents count toward dashboard backlog figures
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Draft | DocumentStatus::Waiting | DocumentStatus::Ready
        )
    }

    /// Whether an operator may move a document from `self` to `to` directly,
    /// without stock effects. `Done` can only be reached by validation.
    pub fn can_set_directly(&self, to: DocumentStatus) -> bool {
        !self.is_terminal() && to != DocumentStatus::Done
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unrecognized document status: {0}")]
pub struct ParseDocumentStatusError(String);

impl FromStr for DocumentStatus {
    type Err = ParseDocumentStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DocumentStatus::Draft),
            "waiting" => Ok(DocumentStatus::Waiting),
            "ready" => Ok(DocumentStatus::Ready),
            "done" => Ok(DocumentStatus::Done),
            "canceled" => Ok(DocumentStatus::Canceled),
            other => Err(ParseDocumentStatusError(other.to_string())),
        }
    }
}

/// Cause of a stock ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveType {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
}

impl MoveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveType::Receipt => "RECEIPT",
            MoveType::Delivery => "DELIVERY",
            MoveType::Transfer => "TRANSFER",
            MoveType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for MoveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unrecognized move type: {0}")]
pub struct ParseMoveTypeError(String);

impl FromStr for MoveType {
    type Err = ParseMoveTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIPT" => Ok(MoveType::Receipt),
            "DELIVERY" => Ok(MoveType::Delivery),
            "TRANSFER" => Ok(MoveType::Transfer),
            "ADJUSTMENT" => Ok(MoveType::Adjustment),
            other => Err(ParseMoveTypeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::Waiting,
            DocumentStatus::Ready,
            DocumentStatus::Done,
            DocumentStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(DocumentStatus::Done.is_terminal());
        assert!(DocumentStatus::Canceled.is_terminal());
        assert!(!DocumentStatus::Draft.is_terminal());
        assert!(!DocumentStatus::Waiting.is_terminal());
        assert!(!DocumentStatus::Ready.is_terminal());
    }

    #[test]
    fn test_done_unreachable_by_direct_update() {
        for from in [
            DocumentStatus::Draft,
            DocumentStatus::Waiting,
            DocumentStatus::Ready,
        ] {
            assert!(!from.can_set_directly(DocumentStatus::Done));
            assert!(from.can_set_directly(DocumentStatus::Canceled));
        }
    }

    #[test]
    fn test_terminal_statuses_are_frozen() {
        for to in [
            DocumentStatus::Draft,
            DocumentStatus::Waiting,
            DocumentStatus::Ready,
            DocumentStatus::Canceled,
        ] {
            assert!(!DocumentStatus::Done.can_set_directly(to));
            assert!(!DocumentStatus::Canceled.can_set_directly(to));
        }
    }

    #[test]
    fn test_move_type_round_trip() {
        for move_type in [
            MoveType::Receipt,
            MoveType::Delivery,
            MoveType::Transfer,
            MoveType::Adjustment,
        ] {
            assert_eq!(move_type.as_str().parse::<MoveType>().unwrap(), move_type);
        }
        assert!("receipt".parse::<MoveType>().is_err());
    }
}
