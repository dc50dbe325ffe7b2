//! Change-channel heuristics
//!
//! When a class does not declare which channel announces changes to an
//! attribute, the resolver falls back to an ordered table of common widget
//! conventions. A rule only applies if the object really exposes a channel
//! with that exact name and argument type; the first applicable rule wins.

use serde::{Deserialize, Serialize};

use crate::object::{ChannelId, ValueType};

/// `attribute` is usually announced by `channel(argument)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRule {
    pub attribute: String,
    pub channel: String,
    #[serde(default)]
    pub argument: Option<ValueType>,
}

impl ChannelRule {
    pub fn new(
        attribute: impl Into<String>,
        channel: impl Into<String>,
        argument: Option<ValueType>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            channel: channel.into(),
            argument,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.channel.clone(), self.argument)
    }
}

/// Ordered heuristic table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRules {
    rules: Vec<ChannelRule>,
}

impl Default for ChannelRules {
    fn default() -> Self {
        use ValueType::*;
        Self::new(vec![
            ChannelRule::new("text", "textChanged", Some(String)),
            ChannelRule::new("plainText", "textChanged", None),
            ChannelRule::new("value", "valueChanged", Some(Int)),
            ChannelRule::new("value", "valueChanged", Some(Double)),
            ChannelRule::new("currentIndex", "currentIndexChanged", Some(Int)),
            ChannelRule::new("currentText", "currentIndexChanged", Some(Int)),
            ChannelRule::new("checked", "toggled", Some(Bool)),
            ChannelRule::new("checkState", "stateChanged", Some(Int)),
            ChannelRule::new("sliderPosition", "sliderMoved", Some(Int)),
            ChannelRule::new("sliderPosition", "valueChanged", Some(Int)),
            ChannelRule::new("progress", "valueChanged", Some(Int)),
        ])
    }
}

impl ChannelRules {
    pub fn new(rules: Vec<ChannelRule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn rules(&self) -> &[ChannelRule] {
        &self.rules
    }

    pub fn push(&mut self, rule: ChannelRule) {
        self.rules.push(rule);
    }

    /// Candidate channels for `attribute`, in table order.
    pub fn candidates<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = ChannelId> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.attribute == attribute)
            .map(ChannelRule::channel_id)
    }

    /// First candidate for `attribute` that appears in `available`.
    pub fn best_match(&self, attribute: &str, available: &[ChannelId]) -> Option<ChannelId> {
        self.candidates(attribute)
            .find(|candidate| available.contains(candidate))
    }
}
