//! Engine State Machine
//!
//! ## Transitions
//!
//! ```text
//!                 start                 window closed, enough antennas
//!   ┌──────┐ ─────────────▶ ┌──────────┐ ─────────────────────────▶ ┌────────────┐
//!   │ Idle │                │ Scanning │                            │ Estimating │
//!   └──────┘ ◀───── stop ── └──────────┘ ◀──── estimate emitted ─── └────────────┘
//!      ▲                    │        ▲                                     │
//!      │     window closed, │        │ next tick          algorithm failed │
//!      │     too few        ▼        │                                     ▼
//!      │                  ┌──────────┴─┐ ◀───────────────────────────────────
//!      │                  │  Degraded  │
//!      │                  └────────────┘
//!      │
//!      │  calibration done/aborted   ┌─────────────┐  calibration accepted
//!      ├──────────────────────────── │ Calibrating │ ◀──── (any but Error)
//!      │                             └─────────────┘
//!      │  reconfigured               ┌─────────────┐  all antennas offline
//!      └──────────────────────────── │    Error    │ ◀──── (any)
//!                                    └─────────────┘
//! ```
//!
//! [`EngineState::on`] is the whole table; anything it returns `None` for is
//! not a legal event in that state and leaves the state unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Waiting for an explicit start
    #[default]
    Idle,
    /// Collecting calibration readings for one antenna
    Calibrating,
    /// Filling the current window
    Scanning,
    /// Running the algorithm on a frozen batch
    Estimating,
    /// Last cycle produced no usable estimate; back to scanning on the next tick
    Degraded,
    /// No usable hardware; needs reconfiguration
    Error,
}

impl EngineState {
    /// Every state
    pub const ALL: [EngineState; 6] = [
        EngineState::Idle,
        EngineState::Calibrating,
        EngineState::Scanning,
        EngineState::Estimating,
        EngineState::Degraded,
        EngineState::Error,
    ];

    /// Lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Calibrating => "calibrating",
            EngineState::Scanning => "scanning",
            EngineState::Estimating => "estimating",
            EngineState::Degraded => "degraded",
            EngineState::Error => "error",
        }
    }

    /// Whether a measurement window is open or being processed
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            EngineState::Scanning | EngineState::Estimating | EngineState::Degraded
        )
    }

    /// Next state after `event`, `None` if the event is not allowed here
    pub fn on(self, event: EngineEvent) -> Option<EngineState> {
        use EngineEvent as E;
        use EngineState as S;

        match (self, event) {
            (_, E::AllOffline) => Some(S::Error),
            (S::Error, E::Reconfigured) => Some(S::Idle),
            (S::Error, _) => None,

            (S::Calibrating, E::CalibrationFinished) => Some(S::Idle),
            (S::Calibrating, _) => None,
            (_, E::CalibrationAccepted) => Some(S::Calibrating),

            (S::Idle, E::Start) => Some(S::Scanning),
            (S::Scanning, E::WindowClosed { sufficient: true }) => Some(S::Estimating),
            (S::Scanning, E::WindowClosed { sufficient: false }) => Some(S::Degraded),
            (S::Estimating, E::EstimateSucceeded) => Some(S::Scanning),
            (S::Estimating, E::EstimateFailed) => Some(S::Degraded),
            (S::Degraded, E::Tick) => Some(S::Scanning),
            (S::Scanning | S::Estimating | S::Degraded, E::Stop) => Some(S::Idle),

            // a swap outside Error keeps the state; the engine restarts the window
            (state, E::Reconfigured) => Some(state),

            _ => None,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEvent {
    /// Operator started scanning
    Start,
    /// Operator stopped scanning
    Stop,
    /// Window timer elapsed
    WindowClosed {
        /// At least `min_measurements` usable antennas reported
        sufficient: bool,
    },
    /// Algorithm produced an estimate
    EstimateSucceeded,
    /// Algorithm failed on the frozen batch
    EstimateFailed,
    /// Periodic tick
    Tick,
    /// Calibration request accepted
    CalibrationAccepted,
    /// Calibration completed or aborted
    CalibrationFinished,
    /// Every configured antenna is offline
    AllOffline,
    /// New configuration applied
    Reconfigured,
}

impl EngineEvent {
    /// Every event, for exhaustive checks
    pub const ALL: [EngineEvent; 11] = [
        EngineEvent::Start,
        EngineEvent::Stop,
        EngineEvent::WindowClosed { sufficient: true },
        EngineEvent::WindowClosed { sufficient: false },
        EngineEvent::EstimateSucceeded,
        EngineEvent::EstimateFailed,
        EngineEvent::Tick,
        EngineEvent::CalibrationAccepted,
        EngineEvent::CalibrationFinished,
        EngineEvent::AllOffline,
        EngineEvent::Reconfigured,
    ];
}
