//! Feed state machine for friendlychat.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the lifecycle of a feed's single subscription. The state machine takes
//! events as input and produces a new state plus a list of actions to execute.
//!
//! The actual store calls (subscribe, unsubscribe) and observer notifications
//! are performed by chat-client, not by this module.

use chat_types::SequenceKey;

/// Feed state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedState {
    /// No subscription. The view may be empty or stale.
    #[default]
    Idle,
    /// Subscription requested, waiting for the first event.
    Starting,
    /// Subscription active, events flowing.
    Live,
}

impl FeedState {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // From Idle
            (Self::Idle, Event::StartRequested) => (Self::Starting, vec![Action::Subscribe]),

            // From Starting
            (Self::Starting, Event::SubscribeFailed { .. }) => (Self::Idle, vec![]),
            (Self::Starting, Event::CaughtUp) => {
                (Self::Live, vec![Action::EmitSignal(Signal::CaughtUp)])
            }
            // The first message doubles as the caught-up signal.
            (Self::Starting, Event::MessageReceived { key }) => (
                Self::Live,
                vec![
                    Action::ApplyMessage { key },
                    Action::EmitSignal(Signal::CaughtUp),
                ],
            ),

            // From Live
            (Self::Live, Event::MessageReceived { key }) => {
                (Self::Live, vec![Action::ApplyMessage { key }])
            }

            // From Starting or Live
            (Self::Starting | Self::Live, Event::StreamFailed { error }) => (
                Self::Idle,
                vec![
                    Action::Unsubscribe,
                    Action::EmitSignal(Signal::Failed { error }),
                ],
            ),
            (Self::Starting | Self::Live, Event::StopRequested) => {
                (Self::Idle, vec![Action::Unsubscribe])
            }

            // Repeated starts, late caught-up, stops while idle: stay put
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a subscription is requested or active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Live)
    }

    /// Check if events are flowing.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Events that can occur in the feed lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked the feed to start.
    StartRequested,
    /// The store refused the subscription.
    SubscribeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The store finished replaying its backlog.
    CaughtUp,
    /// The store delivered an appended message.
    MessageReceived {
        /// Key of the delivered message.
        key: SequenceKey,
    },
    /// The store ended the subscription on its own.
    StreamFailed {
        /// Reason reported by the store.
        error: String,
    },
    /// Caller asked the feed to stop.
    StopRequested,
}

/// Actions to be executed by chat-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a subscription from the resume position.
    Subscribe,
    /// Release the active subscription.
    Unsubscribe,
    /// Append the delivered message to the view and notify the observer.
    ApplyMessage {
        /// Key of the message to apply.
        key: SequenceKey,
    },
    /// Emit a signal to the observer.
    EmitSignal(Signal),
}

/// Lifecycle signals emitted to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The initial backlog has been rendered.
    CaughtUp,
    /// The subscription ended because of a store failure.
    Failed {
        /// Reason reported by the store.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let state = FeedState::new();
        assert!(matches!(state, FeedState::Idle));
        assert_eq!(FeedState::default(), FeedState::Idle);
    }

    #[test]
    fn start_request_transitions_to_starting() {
        let (new_state, actions) = FeedState::Idle.on_event(Event::StartRequested);

        assert!(matches!(new_state, FeedState::Starting));
        assert_eq!(actions, vec![Action::Subscribe]);
    }

    #[test]
    fn start_while_starting_is_noop() {
        let (new_state, actions) = FeedState::Starting.on_event(Event::StartRequested);

        assert!(matches!(new_state, FeedState::Starting));
        assert!(actions.is_empty());
    }

    #[test]
    fn start_while_live_is_noop() {
        let (new_state, actions) = FeedState::Live.on_event(Event::StartRequested);

        assert!(matches!(new_state, FeedState::Live));
        assert!(actions.is_empty());
    }

    #[test]
    fn subscribe_failure_returns_to_idle_without_signal() {
        let (new_state, actions) = FeedState::Starting.on_event(Event::SubscribeFailed {
            error: "unreachable".into(),
        });

        assert!(matches!(new_state, FeedState::Idle));
        assert!(actions.is_empty());
    }

    #[test]
    fn caught_up_transitions_to_live() {
        let (new_state, actions) = FeedState::Starting.on_event(Event::CaughtUp);

        assert!(matches!(new_state, FeedState::Live));
        assert_eq!(actions, vec![Action::EmitSignal(Signal::CaughtUp)]);
    }

    #[test]
    fn first_message_applies_then_signals_caught_up() {
        let key = SequenceKey::new(1);
        let (new_state, actions) =
            FeedState::Starting.on_event(Event::MessageReceived { key });

        assert!(matches!(new_state, FeedState::Live));
        assert_eq!(
            actions,
            vec![
                Action::ApplyMessage { key },
                Action::EmitSignal(Signal::CaughtUp),
            ]
        );
    }

    #[test]
    fn live_message_only_applies() {
        let key = SequenceKey::new(9);
        let (new_state, actions) = FeedState::Live.on_event(Event::MessageReceived { key });

        assert!(matches!(new_state, FeedState::Live));
        assert_eq!(actions, vec![Action::ApplyMessage { key }]);
    }

    #[test]
    fn caught_up_is_signalled_at_most_once() {
        let (state, first) = FeedState::Starting.on_event(Event::CaughtUp);
        let (state, second) = state.on_event(Event::CaughtUp);

        assert!(matches!(state, FeedState::Live));
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn stop_from_live_unsubscribes() {
        let (new_state, actions) = FeedState::Live.on_event(Event::StopRequested);

        assert!(matches!(new_state, FeedState::Idle));
        assert_eq!(actions, vec![Action::Unsubscribe]);
    }

    #[test]
    fn stop_from_starting_unsubscribes() {
        let (new_state, actions) = FeedState::Starting.on_event(Event::StopRequested);

        assert!(matches!(new_state, FeedState::Idle));
        assert_eq!(actions, vec![Action::Unsubscribe]);
    }

    #[test]
    fn stop_while_idle_is_noop() {
        let (new_state, actions) = FeedState::Idle.on_event(Event::StopRequested);

        assert!(matches!(new_state, FeedState::Idle));
        assert!(actions.is_empty());
    }

    #[test]
    fn stream_failure_unsubscribes_and_signals() {
        let (new_state, actions) = FeedState::Live.on_event(Event::StreamFailed {
            error: "permission denied".into(),
        });

        assert!(matches!(new_state, FeedState::Idle));
        assert!(actions.iter().any(|a| matches!(a, Action::Unsubscribe)));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitSignal(Signal::Failed { error }) if error == "permission denied"
        )));
    }

    #[test]
    fn messages_while_idle_are_ignored() {
        let (new_state, actions) = FeedState::Idle.on_event(Event::MessageReceived {
            key: SequenceKey::new(6),
        });

        assert!(matches!(new_state, FeedState::Idle));
        assert!(actions.is_empty());
    }

    #[test]
    fn full_restart_flow() {
        let state = FeedState::new();

        let (state, _) = state.on_event(Event::StartRequested);
        assert!(matches!(state, FeedState::Starting));

        let (state, _) = state.on_event(Event::CaughtUp);
        assert!(matches!(state, FeedState::Live));

        let (state, _) = state.on_event(Event::StopRequested);
        assert!(matches!(state, FeedState::Idle));

        let (state, actions) = state.on_event(Event::StartRequested);
        assert!(matches!(state, FeedState::Starting));
        assert_eq!(actions, vec![Action::Subscribe]);
    }

    #[test]
    fn is_active_helper() {
        assert!(!FeedState::Idle.is_active());
        assert!(FeedState::Starting.is_active());
        assert!(FeedState::Live.is_active());
        assert!(!FeedState::Starting.is_live());
        assert!(FeedState::Live.is_live());
    }
}
