use thiserror::Error;

/// Phase a room can be in. Rooms start in [`RoomPhase::Lobby`] and end in
/// [`RoomPhase::Finished`]; no transition leads back to the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Players join and the host tweaks the configuration.
    Lobby,
    /// The quiz is being assembled in the background.
    Loading,
    /// Waiting for every connected player to decode the round's audio.
    Buffering { round: u32 },
    /// The snippet plays and guesses are collected.
    Playing {
        round: u32,
        /// Unix milliseconds at which playback started.
        started_at_ms: i64,
    },
    /// The solution is on screen between rounds.
    Reviewing { round: u32 },
    /// Terminal scoreboard; the room dies when its last socket closes.
    Finished,
}

impl RoomPhase {
    /// Zero-based round index, where the phase carries one.
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::Buffering { round }
            | Self::Playing { round, .. }
            | Self::Reviewing { round } => Some(*round),
            Self::Lobby | Self::Loading | Self::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Events that drive a room through its phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host pressed start.
    Start,
    /// Background quiz load completed.
    QuizReady,
    /// Background quiz load failed.
    QuizFailed,
    /// Every relevant player buffered the current round, or the host forced it.
    Buffered { started_at_ms: i64 },
    /// Playback window elapsed, or the host forced it.
    RoundOver,
    /// Review window elapsed, or the host forced it.
    ReviewOver { has_next: bool },
    /// Unrecoverable engine failure; park the room on the scoreboard.
    Abort,
}

/// Error returned when an event cannot be applied to the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    pub from: RoomPhase,
    pub event: RoomEvent,
}

/// State machine for a single room's gameplay flow.
#[derive(Debug, Clone, Copy)]
pub struct RoomMachine {
    phase: RoomPhase,
}

impl Default for RoomMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Lobby,
        }
    }
}

impl RoomMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        self.phase = self.compute_transition(event)?;
        Ok(self.phase)
    }

    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Lobby, RoomEvent::Start) => RoomPhase::Loading,
            (RoomPhase::Loading, RoomEvent::QuizReady) => RoomPhase::Buffering { round: 0 },
            (RoomPhase::Loading, RoomEvent::QuizFailed) => RoomPhase::Finished,
            (RoomPhase::Buffering { round }, RoomEvent::Buffered { started_at_ms }) => {
                RoomPhase::Playing {
                    round,
                    started_at_ms,
                }
            }
            (RoomPhase::Playing { round, .. }, RoomEvent::RoundOver) => {
                RoomPhase::Reviewing { round }
            }
            (RoomPhase::Reviewing { round }, RoomEvent::ReviewOver { has_next: true }) => {
                RoomPhase::Buffering { round: round + 1 }
            }
            (RoomPhase::Reviewing { .. }, RoomEvent::ReviewOver { has_next: false }) => {
                RoomPhase::Finished
            }
            (from, RoomEvent::Abort) if !from.is_finished() => RoomPhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(machine: &mut RoomMachine, event: RoomEvent) -> RoomPhase {
        machine.apply(event).unwrap()
    }

    #[test]
    fn initial_phase_is_lobby() {
        let machine = RoomMachine::new();
        assert_eq!(machine.phase(), RoomPhase::Lobby);
    }

    #[test]
    fn full_happy_path_through_two_rounds() {
        let mut machine = RoomMachine::new();

        assert_eq!(apply(&mut machine, RoomEvent::Start), RoomPhase::Loading);
        assert_eq!(
            apply(&mut machine, RoomEvent::QuizReady),
            RoomPhase::Buffering { round: 0 }
        );
        assert_eq!(
            apply(&mut machine, RoomEvent::Buffered { started_at_ms: 100 }),
            RoomPhase::Playing {
                round: 0,
                started_at_ms: 100
            }
        );
        assert_eq!(
            apply(&mut machine, RoomEvent::RoundOver),
            RoomPhase::Reviewing { round: 0 }
        );
        assert_eq!(
            apply(&mut machine, RoomEvent::ReviewOver { has_next: true }),
            RoomPhase::Buffering { round: 1 }
        );
        assert_eq!(
            apply(&mut machine, RoomEvent::Buffered { started_at_ms: 200 }),
            RoomPhase::Playing {
                round: 1,
                started_at_ms: 200
            }
        );
        assert_eq!(
            apply(&mut machine, RoomEvent::RoundOver),
            RoomPhase::Reviewing { round: 1 }
        );
        assert_eq!(
            apply(&mut machine, RoomEvent::ReviewOver { has_next: false }),
            RoomPhase::Finished
        );
    }

    #[test]
    fn quiz_failure_parks_the_room_on_finished() {
        let mut machine = RoomMachine::new();
        apply(&mut machine, RoomEvent::Start);
        assert_eq!(
            apply(&mut machine, RoomEvent::QuizFailed),
            RoomPhase::Finished
        );
    }

    #[test]
    fn abort_is_valid_from_every_non_terminal_phase() {
        let mut machine = RoomMachine::new();
        assert_eq!(apply(&mut machine, RoomEvent::Abort), RoomPhase::Finished);

        let mut machine = RoomMachine::new();
        apply(&mut machine, RoomEvent::Start);
        apply(&mut machine, RoomEvent::QuizReady);
        assert_eq!(apply(&mut machine, RoomEvent::Abort), RoomPhase::Finished);

        let mut finished = machine;
        let err = finished.apply(RoomEvent::Abort).unwrap_err();
        assert_eq!(err.from, RoomPhase::Finished);
    }

    #[test]
    fn invalid_transition_reports_phase_and_event() {
        let mut machine = RoomMachine::new();
        let err = machine.apply(RoomEvent::RoundOver).unwrap_err();
        assert_eq!(err.from, RoomPhase::Lobby);
        assert_eq!(err.event, RoomEvent::RoundOver);
        // The failed apply leaves the phase untouched.
        assert_eq!(machine.phase(), RoomPhase::Lobby);
    }

    #[test]
    fn rounds_increase_only_on_buffering_entry() {
        let mut machine = RoomMachine::new();
        apply(&mut machine, RoomEvent::Start);
        apply(&mut machine, RoomEvent::QuizReady);

        for round in 0..5u32 {
            assert_eq!(machine.phase().round(), Some(round));
            apply(&mut machine, RoomEvent::Buffered { started_at_ms: 0 });
            assert_eq!(machine.phase().round(), Some(round));
            apply(&mut machine, RoomEvent::RoundOver);
            assert_eq!(machine.phase().round(), Some(round));
            apply(&mut machine, RoomEvent::ReviewOver { has_next: true });
        }
        assert_eq!(machine.phase(), RoomPhase::Buffering { round: 5 });
    }
}
