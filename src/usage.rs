//! Token usage and cost accounting
//!
//! Every collaborator call reports a [`Usage`]; chat run loops fold these into
//! a running total whose estimated cost surfaces on
//! [`ChatResult::cost`](crate::chat::ChatResult).
//!
//! The per-model prices in [`Usage::estimate_cost`] are rough, per 1K tokens,
//! and should be kept in sync with the provider's published pricing.

use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Token usage for one or more collaborator calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Tokens in the input prompt.
    pub prompt_tokens: usize,

    /// Tokens in the generated completion.
    pub completion_tokens: usize,

    /// Total tokens (prompt + completion).
    pub total_tokens: usize,

    /// Number of API requests folded into this record.
    pub request_count: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            request_count: 1,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds the values from another `Usage` record to this one.
    pub fn add_usage(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.request_count += other.request_count;
    }

    /// Estimates the cost of the recorded calls for the given model.
    pub fn estimate_cost(&self, model: &str) -> f64 {
        // per 1K tokens
        let (prompt_price, completion_price) = match model {
            "gpt-4" | "gpt-4-0613" => (0.03, 0.06),
            "gpt-4o" => (0.0025, 0.01),
            "gpt-4o-mini" => (0.00015, 0.0006),
            "gpt-3.5-turbo" | "gpt-3.5-turbo-0613" => (0.0015, 0.002),
            _ => (0.002, 0.002),
        };

        (self.prompt_tokens as f64 / 1000.0) * prompt_price
            + (self.completion_tokens as f64 / 1000.0) * completion_price
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, other: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            request_count: self.request_count + other.request_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_usage_accumulation() {
        let mut total = Usage::empty();
        total.add_usage(&Usage::new(1200, 300));
        total.add_usage(&Usage::new(500, 150));

        assert_eq!(total.prompt_tokens, 1700);
        assert_eq!(total.completion_tokens, 450);
        assert_eq!(total.total_tokens, 2150);
        assert_eq!(total.request_count, 2);
    }

    #[test]
    fn test_cost_estimate_is_positive() {
        let usage = Usage::new(1000, 1000);
        assert!(usage.estimate_cost("gpt-3.5-turbo") > 0.0);
        assert!(usage.estimate_cost("gpt-4") > usage.estimate_cost("gpt-3.5-turbo"));
    }

    #[test]
    fn test_add_operator() {
        let sum = Usage::new(10, 5) + Usage::new(20, 15);
        assert_eq!(sum.total_tokens, 50);
        assert_eq!(sum.request_count, 2);
    }
}
