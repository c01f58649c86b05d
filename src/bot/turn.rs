//! Turn-taking policy for bot participants.

use crate::chat::ChatEvent;

/// Outcome of offering an event to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDecision {
    /// Reply to this event.
    Respond,
    /// The bot's own message echoed back.
    OwnEcho,
    /// Same sender as the last event that was answered.
    RepeatSender,
    /// Relay announcement.
    System,
}

impl TurnDecision {
    /// Check whether a reply was authorized.
    pub fn is_respond(&self) -> bool {
        matches!(self, TurnDecision::Respond)
    }
}

/// Decides which inbound events a bot answers.
///
/// A bot answers a participant at most once per run of consecutive messages
/// from that participant without a bot reply in between, and never answers
/// itself or the relay.
#[derive(Debug, Clone)]
pub struct TurnCoordinator {
    name: String,
    last_sender: Option<String>,
}

impl TurnCoordinator {
    /// Create a coordinator for the bot called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_sender: None,
        }
    }

    /// Sender of the last event that was answered, or the bot itself once it
    /// has replied.
    pub fn last_sender(&self) -> Option<&str> {
        self.last_sender.as_deref()
    }

    /// Decide whether to reply to `event` without changing any state.
    pub fn evaluate(&self, event: &ChatEvent) -> TurnDecision {
        if event.sender == self.name {
            return TurnDecision::OwnEcho;
        }
        if self.last_sender.as_deref() == Some(event.sender.as_str()) {
            return TurnDecision::RepeatSender;
        }
        if event.is_system() {
            return TurnDecision::System;
        }
        TurnDecision::Respond
    }

    /// Record that a reply to `sender` was scheduled.
    pub fn commit(&mut self, sender: &str) {
        self.last_sender = Some(sender.to_string());
    }

    /// Record that the bot has just spoken, so every participant may be
    /// answered again.
    pub fn record_own_reply(&mut self) {
        self.last_sender = Some(self.name.clone());
    }

    /// Decide whether to reply to `event`, committing an authorization.
    pub fn should_respond(&mut self, event: &ChatEvent) -> TurnDecision {
        let decision = self.evaluate(event);
        if decision.is_respond() {
            self.commit(&event.sender);
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(coordinator: &mut TurnCoordinator, senders: &[&str]) -> Vec<bool> {
        senders
            .iter()
            .map(|s| coordinator.should_respond(&ChatEvent::new(*s, "msg")).is_respond())
            .collect()
    }

    #[test]
    fn test_repeat_sender_suppressed() {
        let mut coordinator = TurnCoordinator::new("C");
        assert_eq!(
            decide(&mut coordinator, &["A", "A", "B", "A"]),
            vec![true, false, true, true]
        );
        assert_eq!(coordinator.last_sender(), Some("A"));
    }

    #[test]
    fn test_own_echo_suppressed() {
        let mut coordinator = TurnCoordinator::new("C");
        let decision = coordinator.should_respond(&ChatEvent::new("C", "my own words"));

        assert_eq!(decision, TurnDecision::OwnEcho);
        assert_eq!(coordinator.last_sender(), None);
    }

    #[test]
    fn test_system_suppressed() {
        let mut coordinator = TurnCoordinator::new("C");
        let decision = coordinator.should_respond(&ChatEvent::joined("A"));

        assert_eq!(decision, TurnDecision::System);
        assert_eq!(coordinator.last_sender(), None);
    }

    #[test]
    fn test_system_does_not_reset_last_sender() {
        let mut coordinator = TurnCoordinator::new("C");
        assert!(coordinator
            .should_respond(&ChatEvent::new("A", "hi"))
            .is_respond());
        assert!(!coordinator
            .should_respond(&ChatEvent::joined("B"))
            .is_respond());
        assert_eq!(
            coordinator.should_respond(&ChatEvent::new("A", "again")),
            TurnDecision::RepeatSender
        );
    }

    #[test]
    fn test_never_responds_to_self_or_system() {
        let mut coordinator = TurnCoordinator::new("C");
        let senders = ["A", "C", "SYSTEM", "B", "C", "SYSTEM", "A", "C"];
        for sender in senders {
            let decision = coordinator.should_respond(&ChatEvent::new(sender, "x"));
            if sender == "C" || sender == "SYSTEM" {
                assert!(!decision.is_respond(), "responded to {sender}");
            }
        }
    }

    #[test]
    fn test_alternating_senders_all_answered() {
        let mut coordinator = TurnCoordinator::new("C");
        assert_eq!(
            decide(&mut coordinator, &["A", "B", "A", "B"]),
            vec![true, true, true, true]
        );
    }

    #[test]
    fn test_own_reply_allows_same_sender_again() {
        let mut coordinator = TurnCoordinator::new("C");
        assert!(coordinator
            .should_respond(&ChatEvent::new("A", "hello"))
            .is_respond());

        coordinator.record_own_reply();
        assert_eq!(coordinator.last_sender(), Some("C"));

        assert!(coordinator
            .should_respond(&ChatEvent::new("A", "are you there?"))
            .is_respond());
        assert_eq!(
            coordinator.should_respond(&ChatEvent::new("A", "hello?")),
            TurnDecision::RepeatSender
        );
    }

    #[test]
    fn test_evaluate_does_not_commit() {
        let mut coordinator = TurnCoordinator::new("C");
        let event = ChatEvent::new("A", "hi");

        assert!(coordinator.evaluate(&event).is_respond());
        assert_eq!(coordinator.last_sender(), None);
        assert!(coordinator.evaluate(&event).is_respond());

        coordinator.commit("A");
        assert_eq!(coordinator.evaluate(&event), TurnDecision::RepeatSender);
    }
}
