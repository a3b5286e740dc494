//! Generation Stage
//!
//! The discrete phase of processing one conversational turn, and the
//! transition table the control loop follows.

use serde::{Deserialize, Serialize};

/// Phase of the current exchange on a thread.
///
/// A thread starts `Idle`. Only the control loop writes this value; the
/// server may report intermediate stages which are mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStage {
    #[default]
    Idle,
    ChoosingComponent,
    FetchingContext,
    HydratingComponent,
    StreamingResponse,
    Complete,
    Error,
    Cancelled,
}

impl GenerationStage {
    /// Whether new user input may be submitted in this stage.
    ///
    /// This is the admission-control gate for `send_message`.
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            GenerationStage::Idle
                | GenerationStage::Complete
                | GenerationStage::Error
                | GenerationStage::Cancelled
        )
    }

    /// Whether the control loop is expected to move from `self` to `next`.
    ///
    /// `Error` and `Cancelled` are reachable from everywhere and a stage may
    /// always be re-asserted.
    pub fn can_transition_to(self, next: GenerationStage) -> bool {
        use GenerationStage::*;

        if self == next || matches!(next, Error | Cancelled) {
            return true;
        }
        match self {
            Idle | Complete | Error | Cancelled => matches!(next, FetchingContext),
            FetchingContext => matches!(
                next,
                ChoosingComponent | HydratingComponent | StreamingResponse | Complete
            ),
            ChoosingComponent => matches!(
                next,
                FetchingContext | HydratingComponent | StreamingResponse | Complete
            ),
            HydratingComponent => matches!(next, FetchingContext | StreamingResponse | Complete),
            StreamingResponse => matches!(
                next,
                FetchingContext | HydratingComponent | ChoosingComponent | Complete
            ),
        }
    }

    /// Wire name of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStage::Idle => "IDLE",
            GenerationStage::ChoosingComponent => "CHOOSING_COMPONENT",
            GenerationStage::FetchingContext => "FETCHING_CONTEXT",
            GenerationStage::HydratingComponent => "HYDRATING_COMPONENT",
            GenerationStage::StreamingResponse => "STREAMING_RESPONSE",
            GenerationStage::Complete => "COMPLETE",
            GenerationStage::Error => "ERROR",
            GenerationStage::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
