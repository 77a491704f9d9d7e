//! Zone formation state machine
//!
//! The scanner feeds classified candles one at a time through [`step`]. A
//! transition may emit a completed [`Formation`] and may ask for the same
//! candle to be fed again (`replay`) after falling back to
//! [`ScanState::Seeking`]. That replay is how a failed or completed base run
//! hands its last candle to the next pattern attempt without rescanning the
//! run itself.

use super::helpers::{
    body_edge, breaks_out, far_extreme, farthest, first_extends_distal, is_base_candle,
    is_departure_candle, is_fast_close, is_fast_start, is_first_candle,
};
use crate::{classify::ClassifiedCandle, zone::ZoneKind};

/// Per-run rules for one zone kind on one interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineRules {
    pub kind: ZoneKind,
    /// Longest base run a pattern may contain
    pub max_base: usize,
    /// Require the closing candle to break out of the base range
    pub require_breakout: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    /// Looking for a first candle
    Seeking,
    /// First candle found, base run still open
    CollectingBase {
        first: ClassifiedCandle,
        bases: Vec<ClassifiedCandle>,
    },
    /// Base run full; the next candle must close the pattern
    AwaitingClose {
        first: ClassifiedCandle,
        bases: Vec<ClassifiedCandle>,
    },
}

/// A confirmed pattern, before id and score are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct Formation {
    pub kind: ZoneKind,
    pub first: ClassifiedCandle,
    pub bases: Vec<ClassifiedCandle>,
    pub close: ClassifiedCandle,
    pub proximal: f64,
    pub distal: f64,
}

impl Formation {
    /// Candles of the pattern in series order
    pub fn candles(&self) -> impl Iterator<Item = &ClassifiedCandle> {
        std::iter::once(&self.first)
            .chain(self.bases.iter())
            .chain(std::iter::once(&self.close))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ScanState,
    pub formation: Option<Formation>,
    /// Feed the same candle again in the new state
    pub replay: bool,
}

impl Transition {
    fn to(state: ScanState) -> Self {
        Self {
            state,
            formation: None,
            replay: false,
        }
    }

    fn restart(formation: Option<Formation>) -> Self {
        Self {
            state: ScanState::Seeking,
            formation,
            replay: true,
        }
    }
}

/// Advance the machine by one candle
pub fn step(state: ScanState, candle: &ClassifiedCandle, rules: &MachineRules) -> Transition {
    let kind = rules.kind;
    match state {
        ScanState::Seeking => {
            if is_first_candle(candle, kind) {
                Transition::to(ScanState::CollectingBase {
                    first: *candle,
                    bases: Vec::new(),
                })
            } else {
                Transition::to(ScanState::Seeking)
            }
        },
        ScanState::CollectingBase { first, mut bases } => {
            if bases.is_empty() && is_fast_start(&first, kind) && is_fast_close(&first, candle, kind) {
                let formation = fast_formation(first, *candle, kind);
                return Transition {
                    state: ScanState::Seeking,
                    formation: Some(formation),
                    replay: false,
                };
            }
            if is_base_candle(candle, kind) {
                bases.push(*candle);
                let state = if bases.len() >= rules.max_base {
                    ScanState::AwaitingClose { first, bases }
                } else {
                    ScanState::CollectingBase { first, bases }
                };
                return Transition::to(state);
            }
            if bases.is_empty() {
                return Transition::restart(None);
            }
            Transition::restart(close_formation(first, bases, candle, rules))
        },
        ScanState::AwaitingClose { first, bases } => {
            Transition::restart(close_formation(first, bases, candle, rules))
        },
    }
}

fn fast_formation(first: ClassifiedCandle, close: ClassifiedCandle, kind: ZoneKind) -> Formation {
    Formation {
        kind,
        proximal: close.open,
        distal: farthest(far_extreme(&first, kind), far_extreme(&close, kind), kind),
        first,
        bases: Vec::new(),
        close,
    }
}

fn close_formation(
    first: ClassifiedCandle,
    bases: Vec<ClassifiedCandle>,
    candle: &ClassifiedCandle,
    rules: &MachineRules,
) -> Option<Formation> {
    let kind = rules.kind;
    if !is_departure_candle(candle, kind) {
        return None;
    }
    if rules.require_breakout && !breaks_out(candle, &bases, kind) {
        return None;
    }

    let last_base = bases.last()?;
    let proximal = body_edge(last_base, kind);
    let distal = bases
        .iter()
        .chain(first_extends_distal(&first, kind).then_some(&first))
        .map(|c| far_extreme(c, kind))
        .fold(far_extreme(candle, kind), |acc, p| farthest(acc, p, kind));

    Some(Formation {
        kind,
        first,
        bases,
        close: *candle,
        proximal,
        distal,
    })
}

/// Run the machine over a classified series, starting at index 1
pub fn run(candles: &[ClassifiedCandle], rules: &MachineRules) -> Vec<Formation> {
    let mut formations = Vec::new();
    if candles.len() < 3 {
        return formations;
    }

    let mut state = ScanState::Seeking;
    let mut cursor = 1;
    while cursor < candles.len() {
        let transition = step(state, &candles[cursor], rules);
        state = transition.state;
        formations.extend(transition.formation);
        if !transition.replay {
            cursor += 1;
        }
    }
    formations
}
