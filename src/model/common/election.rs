use std::fmt::Display;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectionState {
    /// Being set up. Constituencies and candidates may still change.
    Created,
    /// Open for voting.
    Started,
    /// Closed, with results tallied.
    Ended,
}

impl ElectionState {
    /// Can an election move directly from this state to `next`?
    pub fn can_become(self, next: ElectionState) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Started) | (Self::Started, Self::Ended)
        )
    }

    /// Votes are only accepted while an election is running.
    pub fn accepts_votes(self) -> bool {
        self == Self::Started
    }
}

impl Display for ElectionState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Created => "created",
                Self::Started => "started",
                Self::Ended => "ended",
            }
        )
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        // Matches the serde representation.
        let name = match state {
            ElectionState::Created => "Created",
            ElectionState::Started => "Started",
            ElectionState::Ended => "Ended",
        };
        Bson::String(name.to_string())
    }
}
