//! Termination policies
//!
//! A termination policy is a predicate over the latest [`Message`], evaluated
//! after every turn before the next speaker is chosen. Policies combine with
//! logical OR via [`CompositeTermination`]; evaluation order never affects
//! the outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::items::{Message, Role};

/// Predicate deciding whether a chat should stop after the given message.
pub trait TerminationPolicy: Send + Sync {
    fn should_terminate(&self, message: &Message) -> bool;
}

/// Function-backed policy for ergonomic composition.
#[derive(Clone)]
pub struct TerminationFn(pub Arc<dyn Fn(&Message) -> bool + Send + Sync>);

impl TerminationPolicy for TerminationFn {
    fn should_terminate(&self, message: &Message) -> bool {
        (self.0)(message)
    }
}

/// Composite policy: terminate when any sub-policy fires.
#[derive(Clone, Default)]
pub struct CompositeTermination {
    policies: Vec<Arc<dyn TerminationPolicy>>,
}

impl CompositeTermination {
    pub fn new(policies: Vec<Arc<dyn TerminationPolicy>>) -> Self {
        Self { policies }
    }

    pub fn push(&mut self, policy: Arc<dyn TerminationPolicy>) {
        self.policies.push(policy);
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl TerminationPolicy for CompositeTermination {
    fn should_terminate(&self, message: &Message) -> bool {
        self.policies.iter().any(|p| p.should_terminate(message))
    }
}

/// Never terminate.
pub fn never() -> TerminationFn {
    TerminationFn(Arc::new(|_| false))
}

/// Terminate when the message content contains `token`, case-insensitively.
pub fn contains_token(token: impl Into<String>) -> TerminationFn {
    let token = token.into().to_lowercase();
    TerminationFn(Arc::new(move |msg: &Message| {
        msg.content.to_lowercase().contains(&token)
    }))
}

/// Fatigue counter over consecutive auto replies.
///
/// Counts, per sender, consecutive non-human messages with unchanged content.
/// A user-role message resets every counter; a content change resets that
/// sender's counter. Fires once a sender reaches `limit` consecutive
/// identical auto replies.
#[derive(Clone)]
pub struct AutoReplyLimit {
    limit: usize,
    counters: Arc<Mutex<HashMap<String, (usize, String)>>>,
}

impl AutoReplyLimit {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl TerminationPolicy for AutoReplyLimit {
    fn should_terminate(&self, message: &Message) -> bool {
        let mut counters = self.counters.lock().unwrap();

        if message.role == Role::User {
            counters.clear();
            return false;
        }

        let entry = counters
            .entry(message.sender.clone())
            .or_insert((0, String::new()));
        if entry.1 == message.content {
            entry.0 += 1;
        } else {
            *entry = (1, message.content.clone());
        }

        entry.0 >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_policy() {
        let policy = never();
        assert!(!policy.should_terminate(&Message::assistant("a", "TERMINATE")));
    }

    #[test]
    fn test_contains_token_is_case_insensitive() {
        let policy = contains_token("TERMINATE");
        assert!(policy.should_terminate(&Message::assistant("a", "ok, terminate now")));
        assert!(policy.should_terminate(&Message::assistant("a", "TERMINATE")));
        assert!(!policy.should_terminate(&Message::assistant("a", "keep going")));
    }

    #[test]
    fn test_composite_or_semantics() {
        let mut composite = CompositeTermination::default();
        composite.push(Arc::new(never()));
        composite.push(Arc::new(contains_token("done")));

        assert!(composite.should_terminate(&Message::assistant("a", "we are DONE here")));
        assert!(!composite.should_terminate(&Message::assistant("a", "still working")));
    }

    #[test]
    fn test_composite_order_does_not_matter() {
        let forwards = CompositeTermination::new(vec![
            Arc::new(contains_token("stop")),
            Arc::new(never()),
        ]);
        let backwards = CompositeTermination::new(vec![
            Arc::new(never()),
            Arc::new(contains_token("stop")),
        ]);

        let msg = Message::assistant("a", "please stop");
        assert_eq!(
            forwards.should_terminate(&msg),
            backwards.should_terminate(&msg)
        );
    }

    #[test]
    fn test_auto_reply_limit_counts_identical_replies() {
        let policy = AutoReplyLimit::new(3);
        let repeat = Message::assistant("echo", "same answer");

        assert!(!policy.should_terminate(&repeat));
        assert!(!policy.should_terminate(&repeat));
        assert!(policy.should_terminate(&repeat));
    }

    #[test]
    fn test_auto_reply_limit_resets_on_content_change() {
        let policy = AutoReplyLimit::new(2);
        let first = Message::assistant("echo", "alpha");
        let second = Message::assistant("echo", "beta");

        assert!(!policy.should_terminate(&first));
        assert!(!policy.should_terminate(&second));
        assert!(policy.should_terminate(&second));
    }

    #[test]
    fn test_auto_reply_limit_resets_on_human_message() {
        let policy = AutoReplyLimit::new(2);
        let auto = Message::assistant("echo", "same");

        assert!(!policy.should_terminate(&auto));
        assert!(!policy.should_terminate(&Message::user("human", "try harder")));
        assert!(!policy.should_terminate(&auto));
        assert!(policy.should_terminate(&auto));
    }
}
