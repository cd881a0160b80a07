//! Relay failover state machine.
//!
//! This module provides a pure, side-effect-free state machine for one
//! profile fetch walking an ordered relay list. The state machine takes events
//! as input and produces a new state plus a list of actions to execute.
//!
//! The actual I/O (connecting, sending REQ, timers) is performed by
//! profile-client, not by this module. This enables instant unit testing
//! without network mocks.
//!
//! ```text
//! Idle ─Start─▶ Connecting ─Connected─▶ Subscribed ─EOSE/TimedOut─▶ Failing
//!                  ▲   │                    │                         │
//!                  │   └──ConnectFailed─────┴──────Closed─────────────┤
//!                  └──────────── next relay (keys still pending) ◀────┘
//! ```

use profile_types::Event;

/// Failover state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverState {
    /// Fetch not started.
    Idle,
    /// Opening a connection to the relay at `relay`.
    Connecting {
        /// Index into the relay list.
        relay: usize,
    },
    /// REQ sent, waiting for events, EOSE or timeout.
    Subscribed {
        /// Index into the relay list.
        relay: usize,
    },
    /// Connection is being torn down; the next relay follows if keys remain.
    Failing {
        /// Index into the relay list.
        relay: usize,
    },
    /// Fetch finished.
    Settled {
        /// How the fetch ended.
        outcome: FailoverOutcome,
    },
}

/// How a fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// No keys needed fetching; no connection was opened.
    NothingToFetch,
    /// Every claimed key was resolved.
    Resolved,
    /// The relay list ran out with keys still pending.
    Exhausted,
}

impl FailoverState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// `relay_count` is the length of the relay list. This is a pure function;
    /// the caller (profile-client) executes the returned actions.
    pub fn on_event(self, event: FailoverEvent, relay_count: usize) -> (Self, Vec<FailoverAction>) {
        match (self, event) {
            // From Idle
            (Self::Idle, FailoverEvent::Start { pending: 0 }) => (
                Self::Settled {
                    outcome: FailoverOutcome::NothingToFetch,
                },
                vec![],
            ),
            (Self::Idle, FailoverEvent::Start { .. }) => next_relay(None, relay_count),

            // From Connecting
            (Self::Connecting { relay }, FailoverEvent::Connected) => (
                Self::Subscribed { relay },
                vec![
                    FailoverAction::Subscribe { relay },
                    FailoverAction::StartResponseTimer,
                ],
            ),
            (Self::Connecting { relay }, FailoverEvent::ConnectFailed { pending, .. }) => {
                advance(relay, pending, relay_count, vec![])
            }

            // From Subscribed
            (Self::Subscribed { relay }, FailoverEvent::EventReceived { event }) => (
                Self::Subscribed { relay },
                vec![FailoverAction::ProcessEvent { event }],
            ),
            (Self::Subscribed { relay }, FailoverEvent::EndOfStoredEvents) => (
                Self::Failing { relay },
                vec![
                    FailoverAction::CancelResponseTimer,
                    FailoverAction::Unsubscribe,
                    FailoverAction::Disconnect,
                ],
            ),
            (Self::Subscribed { relay }, FailoverEvent::TimedOut) => (
                Self::Failing { relay },
                vec![FailoverAction::Unsubscribe, FailoverAction::Disconnect],
            ),

            // Connection gone, whatever the cause
            (
                Self::Connecting { relay } | Self::Subscribed { relay } | Self::Failing { relay },
                FailoverEvent::Closed { pending, .. },
            ) => advance(
                relay,
                pending,
                relay_count,
                vec![FailoverAction::CancelResponseTimer],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Relay index currently in use, if any.
    pub fn relay(&self) -> Option<usize> {
        match self {
            Self::Connecting { relay } | Self::Subscribed { relay } | Self::Failing { relay } => {
                Some(*relay)
            }
            Self::Idle | Self::Settled { .. } => None,
        }
    }

    /// Check if the fetch has finished.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }

    /// Outcome once settled.
    pub fn outcome(&self) -> Option<FailoverOutcome> {
        match self {
            Self::Settled { outcome } => Some(*outcome),
            _ => None,
        }
    }
}

impl Default for FailoverState {
    fn default() -> Self {
        Self::new()
    }
}

/// After a relay is done: stop if nothing is pending, else try the next one.
fn advance(
    relay: usize,
    pending: usize,
    relay_count: usize,
    mut actions: Vec<FailoverAction>,
) -> (FailoverState, Vec<FailoverAction>) {
    if pending == 0 {
        return (
            FailoverState::Settled {
                outcome: FailoverOutcome::Resolved,
            },
            actions,
        );
    }
    let (state, more) = next_relay(Some(relay), relay_count);
    actions.extend(more);
    (state, actions)
}

fn next_relay(current: Option<usize>, relay_count: usize) -> (FailoverState, Vec<FailoverAction>) {
    let next = current.map_or(0, |relay| relay + 1);
    if next >= relay_count {
        (
            FailoverState::Settled {
                outcome: FailoverOutcome::Exhausted,
            },
            vec![FailoverAction::ReleasePending],
        )
    } else {
        (
            FailoverState::Connecting { relay: next },
            vec![FailoverAction::Connect { relay: next }],
        )
    }
}

/// Events that can occur while fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverEvent {
    /// Fetch requested.
    Start {
        /// Number of keys claimed for this fetch.
        pending: usize,
    },
    /// Transport connection succeeded.
    Connected,
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
        /// Keys still unresolved.
        pending: usize,
    },
    /// Event received on the current subscription.
    EventReceived {
        /// The raw event.
        event: Event,
    },
    /// Relay signalled end of stored events for the current subscription.
    EndOfStoredEvents,
    /// Response timer fired.
    TimedOut,
    /// Connection closed (by us after EOSE/timeout, or by the relay or network).
    Closed {
        /// Reason for the close.
        reason: String,
        /// Keys still unresolved.
        pending: usize,
    },
}

/// Actions to be executed by the profile-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverAction {
    /// Open a fresh connection to the relay at this index.
    Connect {
        /// Index into the relay list.
        relay: usize,
    },
    /// Send REQ for the keys still pending.
    Subscribe {
        /// Index into the relay list.
        relay: usize,
    },
    /// Arm the response timer.
    StartResponseTimer,
    /// Disarm the response timer.
    CancelResponseTimer,
    /// Decode the event and update the store.
    ProcessEvent {
        /// The raw event.
        event: Event,
    },
    /// Send CLOSE for the current subscription.
    Unsubscribe,
    /// Close the transport.
    Disconnect,
    /// Release every key still pending from the in-flight tracker.
    ReleasePending,
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_types::PublicKey;

    fn profile_event() -> Event {
        let key = PublicKey::parse(&"a".repeat(64)).unwrap();
        Event::metadata(&key, r#"{"name":"alice"}"#, 1)
    }

    fn closed(pending: usize) -> FailoverEvent {
        FailoverEvent::Closed {
            reason: "closed".into(),
            pending,
        }
    }

    #[test]
    fn starts_idle() {
        let state = FailoverState::new();
        assert!(matches!(state, FailoverState::Idle));
        assert!(!state.is_settled());
    }

    #[test]
    fn start_with_nothing_pending_settles_without_connecting() {
        let (state, actions) = FailoverState::Idle.on_event(FailoverEvent::Start { pending: 0 }, 3);

        assert_eq!(state.outcome(), Some(FailoverOutcome::NothingToFetch));
        assert!(actions.is_empty());
    }

    #[test]
    fn start_connects_to_first_relay() {
        let (state, actions) = FailoverState::Idle.on_event(FailoverEvent::Start { pending: 2 }, 3);

        assert_eq!(state, FailoverState::Connecting { relay: 0 });
        assert_eq!(actions, vec![FailoverAction::Connect { relay: 0 }]);
    }

    #[test]
    fn start_with_empty_relay_list_releases() {
        let (state, actions) = FailoverState::Idle.on_event(FailoverEvent::Start { pending: 2 }, 0);

        assert_eq!(state.outcome(), Some(FailoverOutcome::Exhausted));
        assert_eq!(actions, vec![FailoverAction::ReleasePending]);
    }

    #[test]
    fn connect_success_subscribes_and_arms_timer() {
        let state = FailoverState::Connecting { relay: 1 };
        let (new_state, actions) = state.on_event(FailoverEvent::Connected, 3);

        assert_eq!(new_state, FailoverState::Subscribed { relay: 1 });
        assert_eq!(
            actions,
            vec![
                FailoverAction::Subscribe { relay: 1 },
                FailoverAction::StartResponseTimer
            ]
        );
    }

    #[test]
    fn connect_failure_moves_to_next_relay() {
        let state = FailoverState::Connecting { relay: 0 };
        let (new_state, actions) = state.on_event(
            FailoverEvent::ConnectFailed {
                error: "refused".into(),
                pending: 1,
            },
            3,
        );

        assert_eq!(new_state, FailoverState::Connecting { relay: 1 });
        assert_eq!(actions, vec![FailoverAction::Connect { relay: 1 }]);
    }

    #[test]
    fn events_are_processed_while_subscribed() {
        let state = FailoverState::Subscribed { relay: 0 };
        let (new_state, actions) = state.on_event(
            FailoverEvent::EventReceived {
                event: profile_event(),
            },
            3,
        );

        assert_eq!(new_state, FailoverState::Subscribed { relay: 0 });
        assert!(actions
            .iter()
            .any(|a| matches!(a, FailoverAction::ProcessEvent { .. })));
    }

    #[test]
    fn eose_cancels_timer_and_disconnects() {
        let state = FailoverState::Subscribed { relay: 0 };
        let (new_state, actions) = state.on_event(FailoverEvent::EndOfStoredEvents, 3);

        assert_eq!(new_state, FailoverState::Failing { relay: 0 });
        assert_eq!(
            actions,
            vec![
                FailoverAction::CancelResponseTimer,
                FailoverAction::Unsubscribe,
                FailoverAction::Disconnect
            ]
        );
    }

    #[test]
    fn timeout_disconnects() {
        let state = FailoverState::Subscribed { relay: 2 };
        let (new_state, actions) = state.on_event(FailoverEvent::TimedOut, 3);

        assert_eq!(new_state, FailoverState::Failing { relay: 2 });
        assert!(actions.contains(&FailoverAction::Disconnect));
        assert!(!actions.contains(&FailoverAction::CancelResponseTimer));
    }

    #[test]
    fn close_with_keys_pending_fails_over() {
        let state = FailoverState::Failing { relay: 0 };
        let (new_state, actions) = state.on_event(closed(1), 3);

        assert_eq!(new_state, FailoverState::Connecting { relay: 1 });
        assert_eq!(
            actions,
            vec![
                FailoverAction::CancelResponseTimer,
                FailoverAction::Connect { relay: 1 }
            ]
        );
    }

    #[test]
    fn close_with_nothing_pending_resolves() {
        let state = FailoverState::Failing { relay: 0 };
        let (new_state, actions) = state.on_event(closed(0), 3);

        assert_eq!(new_state.outcome(), Some(FailoverOutcome::Resolved));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, FailoverAction::Connect { .. })));
    }

    #[test]
    fn unsolicited_close_while_subscribed_fails_over() {
        let state = FailoverState::Subscribed { relay: 0 };
        let (new_state, _) = state.on_event(closed(2), 2);

        assert_eq!(new_state, FailoverState::Connecting { relay: 1 });
    }

    #[test]
    fn close_on_last_relay_exhausts() {
        let state = FailoverState::Failing { relay: 2 };
        let (new_state, actions) = state.on_event(closed(1), 3);

        assert_eq!(new_state.outcome(), Some(FailoverOutcome::Exhausted));
        assert!(actions.contains(&FailoverAction::ReleasePending));
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let (state, actions) = FailoverState::Idle.on_event(FailoverEvent::TimedOut, 3);
        assert_eq!(state, FailoverState::Idle);
        assert!(actions.is_empty());

        let settled = FailoverState::Settled {
            outcome: FailoverOutcome::Resolved,
        };
        let (state, actions) = settled.clone().on_event(closed(1), 3);
        assert_eq!(state, settled);
        assert!(actions.is_empty());

        // Late events after EOSE are dropped
        let (state, actions) = FailoverState::Failing { relay: 0 }.on_event(
            FailoverEvent::EventReceived {
                event: profile_event(),
            },
            3,
        );
        assert_eq!(state, FailoverState::Failing { relay: 0 });
        assert!(actions.is_empty());
    }

    #[test]
    fn full_failover_walk() {
        // R1 refuses, R2 times out, R3 answers
        let (state, _) = FailoverState::Idle.on_event(FailoverEvent::Start { pending: 1 }, 3);
        let (state, _) = state.on_event(
            FailoverEvent::ConnectFailed {
                error: "refused".into(),
                pending: 1,
            },
            3,
        );
        assert_eq!(state.relay(), Some(1));

        let (state, _) = state.on_event(FailoverEvent::Connected, 3);
        let (state, _) = state.on_event(FailoverEvent::TimedOut, 3);
        let (state, _) = state.on_event(closed(1), 3);
        assert_eq!(state.relay(), Some(2));

        let (state, _) = state.on_event(FailoverEvent::Connected, 3);
        let (state, _) = state.on_event(
            FailoverEvent::EventReceived {
                event: profile_event(),
            },
            3,
        );
        let (state, _) = state.on_event(FailoverEvent::EndOfStoredEvents, 3);
        let (state, _) = state.on_event(closed(0), 3);

        assert_eq!(state.outcome(), Some(FailoverOutcome::Resolved));
        assert_eq!(state.relay(), None);
    }
}
