use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a tasting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is being staged by the moderator; the lobby is not open yet.
    Draft,
    /// Lobby is open and participants can join via invite code.
    Waiting,
    /// The tasting is underway and phases are advancing.
    Active,
    /// The tasting is paused by the moderator.
    Paused,
    /// Whiskey identities and scores are visible; no more scoring.
    Reveal,
    /// Terminal state; the session is archived.
    Completed,
}

impl SessionStatus {
    /// Stable snake_case name, matching the serialized representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Draft => "draft",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Reveal => "reveal",
            SessionStatus::Completed => "completed",
        }
    }
}

/// Sub-step within tasting a single whiskey, cycled in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TastingPhase {
    /// Pour the measure.
    Pour,
    /// Nose the glass.
    Nosing,
    /// First sip, neat.
    TastingNeat,
    /// Second pass with a few drops of water.
    TastingWater,
    /// Participants fill in and lock their scores.
    Scoring,
    /// Crackers and water before the next dram.
    PalateReset,
}

impl TastingPhase {
    /// Every phase in cycle order.
    pub const CYCLE: [TastingPhase; 6] = [
        TastingPhase::Pour,
        TastingPhase::Nosing,
        TastingPhase::TastingNeat,
        TastingPhase::TastingWater,
        TastingPhase::Scoring,
        TastingPhase::PalateReset,
    ];

    /// Stable snake_case name, matching the serialized representation.
    pub fn as_str(self) -> &'static str {
        match self {
            TastingPhase::Pour => "pour",
            TastingPhase::Nosing => "nosing",
            TastingPhase::TastingNeat => "tasting_neat",
            TastingPhase::TastingWater => "tasting_water",
            TastingPhase::Scoring => "scoring",
            TastingPhase::PalateReset => "palate_reset",
        }
    }

    /// The phase that follows this one within the same whiskey, or `None`
    /// when the cycle is exhausted and the next whiskey is up.
    pub fn next(self) -> Option<TastingPhase> {
        match self {
            TastingPhase::Pour => Some(TastingPhase::Nosing),
            TastingPhase::Nosing => Some(TastingPhase::TastingNeat),
            TastingPhase::TastingNeat => Some(TastingPhase::TastingWater),
            TastingPhase::TastingWater => Some(TastingPhase::Scoring),
            TastingPhase::Scoring => Some(TastingPhase::PalateReset),
            TastingPhase::PalateReset => None,
        }
    }
}

/// Moderator-triggered events that move a session through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Open the lobby of a draft session so participants can join.
    Open,
    /// Start the tasting: phase becomes pour, whiskey index 0.
    Start,
    /// Move the phase clock forward, or jump to a given phase/whiskey.
    Advance {
        /// Jump directly to this phase instead of the next one in the cycle.
        phase: Option<TastingPhase>,
        /// Jump directly to this whiskey index.
        whiskey_index: Option<usize>,
    },
    /// Pause the tasting without touching phase or index.
    Pause,
    /// Resume a paused tasting.
    Resume,
    /// Expose whiskey identities and scores. Irreversible.
    Reveal,
    /// Finalize the session. Terminal.
    End,
}

impl LifecycleEvent {
    /// Short name used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Open => "open",
            LifecycleEvent::Start => "start",
            LifecycleEvent::Advance { .. } => "advance",
            LifecycleEvent::Pause => "pause",
            LifecycleEvent::Resume => "resume",
            LifecycleEvent::Reveal => "reveal",
            LifecycleEvent::End => "end",
        }
    }
}

/// Error returned when an event cannot be applied to the current lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The event is not valid from the session's current status.
    #[error("`{}` is not allowed while the session is {}", event.name(), from.as_str())]
    InvalidTransition {
        /// Status the session was in when the event arrived.
        from: SessionStatus,
        /// The rejected event.
        event: LifecycleEvent,
    },
    /// A bare advance arrived after the last whiskey finished its cycle.
    #[error("all whiskeys have been tasted; reveal or end the session")]
    AllWhiskeysTasted,
    /// A targeted advance named a whiskey index outside the session's list.
    #[error("whiskey index {index} is out of range (session has {count} whiskeys)")]
    WhiskeyIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of whiskeys in the session.
        count: usize,
    },
    /// Start was requested on a session with no whiskeys.
    #[error("session has no whiskeys to taste")]
    NoWhiskeys,
}

/// The mutable lifecycle slice of a session row. These three fields are only
/// ever written through [`Lifecycle::apply`]; no other code path updates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    /// Current session status.
    pub status: SessionStatus,
    /// Current phase, populated while the session is active or paused.
    pub phase: Option<TastingPhase>,
    /// Index into the session's ordered whiskey list, or one-past-the-end
    /// once every whiskey has been through its cycle.
    pub whiskey_index: usize,
}

impl Lifecycle {
    /// Lifecycle of a freshly created session.
    pub fn new(status: SessionStatus) -> Self {
        Self {
            status,
            phase: None,
            whiskey_index: 0,
        }
    }

    /// Compute the lifecycle that results from applying `event`, without
    /// mutating `self`. `whiskey_count` is the length of the session's
    /// ordered whiskey list.
    pub fn apply(
        &self,
        event: &LifecycleEvent,
        whiskey_count: usize,
    ) -> Result<Lifecycle, TransitionError> {
        use SessionStatus::*;

        let next = match (self.status, event) {
            (Draft, LifecycleEvent::Open) => Lifecycle {
                status: Waiting,
                phase: None,
                whiskey_index: 0,
            },
            (Draft | Waiting, LifecycleEvent::Start) => {
                if whiskey_count == 0 {
                    return Err(TransitionError::NoWhiskeys);
                }
                Lifecycle {
                    status: Active,
                    phase: Some(TastingPhase::Pour),
                    whiskey_index: 0,
                }
            }
            (
                Active,
                LifecycleEvent::Advance {
                    phase,
                    whiskey_index,
                },
            ) => {
                let (phase, index) = self.advance(*phase, *whiskey_index, whiskey_count)?;
                Lifecycle {
                    status: Active,
                    phase: Some(phase),
                    whiskey_index: index,
                }
            }
            (Active, LifecycleEvent::Pause) => Lifecycle {
                status: Paused,
                ..*self
            },
            (Paused, LifecycleEvent::Resume) => Lifecycle {
                status: Active,
                ..*self
            },
            (Active | Paused, LifecycleEvent::Reveal) => Lifecycle {
                status: Reveal,
                phase: None,
                whiskey_index: self.whiskey_index,
            },
            (Active | Paused | Reveal, LifecycleEvent::End) => Lifecycle {
                status: Completed,
                phase: None,
                whiskey_index: self.whiskey_index,
            },
            (from, event) => {
                return Err(TransitionError::InvalidTransition {
                    from,
                    event: event.clone(),
                });
            }
        };

        Ok(next)
    }

    /// Resolve an advance event into the next `(phase, whiskey_index)` pair.
    fn advance(
        &self,
        phase: Option<TastingPhase>,
        whiskey_index: Option<usize>,
        whiskey_count: usize,
    ) -> Result<(TastingPhase, usize), TransitionError> {
        if phase.is_some() || whiskey_index.is_some() {
            // Targeted jump: the moderator named a phase, a whiskey, or both.
            let index = whiskey_index.unwrap_or(self.whiskey_index);
            if index >= whiskey_count {
                return Err(TransitionError::WhiskeyIndexOutOfRange {
                    index,
                    count: whiskey_count,
                });
            }
            return Ok((phase.unwrap_or(TastingPhase::Pour), index));
        }

        if self.whiskey_index >= whiskey_count {
            return Err(TransitionError::AllWhiskeysTasted);
        }

        let current = self.phase.unwrap_or(TastingPhase::Pour);
        match current.next() {
            Some(next) => Ok((next, self.whiskey_index)),
            None => {
                let next_index = self.whiskey_index + 1;
                if next_index < whiskey_count {
                    Ok((TastingPhase::Pour, next_index))
                } else {
                    // Past the last whiskey: the index parks one-past-the-end
                    // and the phase clock stops where it was.
                    Ok((TastingPhase::PalateReset, next_index))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_advance() -> LifecycleEvent {
        LifecycleEvent::Advance {
            phase: None,
            whiskey_index: None,
        }
    }

    fn apply(lifecycle: &mut Lifecycle, event: LifecycleEvent, count: usize) -> Lifecycle {
        *lifecycle = lifecycle.apply(&event, count).unwrap();
        *lifecycle
    }

    #[test]
    fn start_initializes_phase_and_index() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        let next = apply(&mut lc, LifecycleEvent::Start, 2);
        assert_eq!(next.status, SessionStatus::Active);
        assert_eq!(next.phase, Some(TastingPhase::Pour));
        assert_eq!(next.whiskey_index, 0);
    }

    #[test]
    fn start_requires_at_least_one_whiskey() {
        let lc = Lifecycle::new(SessionStatus::Waiting);
        assert_eq!(
            lc.apply(&LifecycleEvent::Start, 0),
            Err(TransitionError::NoWhiskeys)
        );
    }

    #[test]
    fn bare_advance_visits_every_phase_before_index_moves() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 2);

        let mut visited = vec![lc.phase.unwrap()];
        for _ in 0..5 {
            apply(&mut lc, bare_advance(), 2);
            assert_eq!(lc.whiskey_index, 0);
            visited.push(lc.phase.unwrap());
        }
        assert_eq!(visited, TastingPhase::CYCLE.to_vec());

        // The next advance rolls over to whiskey #2's pour.
        apply(&mut lc, bare_advance(), 2);
        assert_eq!(lc.phase, Some(TastingPhase::Pour));
        assert_eq!(lc.whiskey_index, 1);
    }

    #[test]
    fn final_advance_parks_one_past_the_end() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 1);
        for _ in 0..5 {
            apply(&mut lc, bare_advance(), 1);
        }
        assert_eq!(lc.phase, Some(TastingPhase::PalateReset));

        apply(&mut lc, bare_advance(), 1);
        assert_eq!(lc.whiskey_index, 1);

        assert_eq!(
            lc.apply(&bare_advance(), 1),
            Err(TransitionError::AllWhiskeysTasted)
        );
    }

    #[test]
    fn targeted_advance_jumps_to_phase_and_whiskey() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 3);

        let next = apply(
            &mut lc,
            LifecycleEvent::Advance {
                phase: Some(TastingPhase::Scoring),
                whiskey_index: Some(2),
            },
            3,
        );
        assert_eq!(next.phase, Some(TastingPhase::Scoring));
        assert_eq!(next.whiskey_index, 2);
    }

    #[test]
    fn targeted_advance_rejects_out_of_range_index() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 2);

        assert_eq!(
            lc.apply(
                &LifecycleEvent::Advance {
                    phase: None,
                    whiskey_index: Some(2),
                },
                2,
            ),
            Err(TransitionError::WhiskeyIndexOutOfRange { index: 2, count: 2 })
        );
    }

    #[test]
    fn pause_and_resume_keep_phase_and_index() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 2);
        apply(&mut lc, bare_advance(), 2);
        let before = lc;

        apply(&mut lc, LifecycleEvent::Pause, 2);
        assert_eq!(lc.status, SessionStatus::Paused);
        assert_eq!(lc.phase, before.phase);
        assert_eq!(lc.whiskey_index, before.whiskey_index);

        apply(&mut lc, LifecycleEvent::Resume, 2);
        assert_eq!(lc.status, SessionStatus::Active);
        assert_eq!(lc.phase, before.phase);
    }

    #[test]
    fn reveal_is_reachable_from_active_and_paused() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 1);
        apply(&mut lc, LifecycleEvent::Pause, 1);
        let next = apply(&mut lc, LifecycleEvent::Reveal, 1);
        assert_eq!(next.status, SessionStatus::Reveal);
        assert_eq!(next.phase, None);
    }

    #[test]
    fn completed_is_terminal() {
        let mut lc = Lifecycle::new(SessionStatus::Waiting);
        apply(&mut lc, LifecycleEvent::Start, 1);
        apply(&mut lc, LifecycleEvent::Reveal, 1);
        apply(&mut lc, LifecycleEvent::End, 1);
        assert_eq!(lc.status, SessionStatus::Completed);

        for event in [
            LifecycleEvent::Open,
            LifecycleEvent::Start,
            bare_advance(),
            LifecycleEvent::Pause,
            LifecycleEvent::Resume,
            LifecycleEvent::Reveal,
            LifecycleEvent::End,
        ] {
            let err = lc.apply(&event, 1).unwrap_err();
            assert!(
                matches!(err, TransitionError::InvalidTransition { .. }),
                "expected invalid transition for {event:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn a_waiting_lobby_cannot_be_opened_twice() {
        let lc = Lifecycle::new(SessionStatus::Waiting);
        let err = lc.apply(&LifecycleEvent::Open, 1).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: SessionStatus::Waiting,
                event: LifecycleEvent::Open,
            }
        );
    }

    #[test]
    fn draft_opens_into_waiting() {
        let lc = Lifecycle::new(SessionStatus::Draft);
        let next = lc.apply(&LifecycleEvent::Open, 0).unwrap();
        assert_eq!(next.status, SessionStatus::Waiting);
    }
}
