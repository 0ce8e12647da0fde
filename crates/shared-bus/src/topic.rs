//! # Topic Patterns
//!
//! AMQP topic-exchange matching. Routing keys are dot-separated words:
//!
//! - `*` matches exactly one word
//! - `#` matches zero or more words
//!
//! ```text
//! notification.*.requested   matches  notification.create.requested
//! user.#.requested           matches  user.list.requested, user.auth.login.requested
//! notification.#             matches  notification, notification.read
//! ```

use crate::broker::BrokerError;
use std::fmt;
use std::str::FromStr;

/// A validated binding pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPattern {
    raw: String,
    words: Vec<String>,
}

impl TopicPattern {
    /// Parse a binding pattern. Empty patterns and empty words are rejected.
    pub fn parse(pattern: &str) -> Result<Self, BrokerError> {
        if pattern.is_empty() || pattern.split('.').any(str::is_empty) {
            return Err(BrokerError::InvalidPattern(pattern.to_string()));
        }
        Ok(Self {
            raw: pattern.to_string(),
            words: pattern.split('.').map(str::to_string).collect(),
        })
    }

    /// Whether `routing_key` matches under topic semantics.
    #[must_use]
    pub fn matches(&self, routing_key: &str) -> bool {
        let key: Vec<&str> = routing_key.split('.').collect();
        match_words(&self.words, &key)
    }

    /// Whether the pattern is a literal key (usable on a direct exchange).
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.words.iter().all(|w| w != "*" && w != "#")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn match_words(pattern: &[String], key: &[&str]) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        return key.is_empty();
    };

    match head.as_str() {
        "#" => match_words(rest, key) || (!key.is_empty() && match_words(pattern, &key[1..])),
        "*" => !key.is_empty() && match_words(rest, &key[1..]),
        word => key.first().is_some_and(|k| *k == word) && match_words(rest, &key[1..]),
    }
}

impl FromStr for TopicPattern {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
