//! Serves recorded responses for live requests during replay.

use std::collections::HashMap;
use std::sync::Arc;

use super::format::{Interaction, Scenario};
use super::signature::RequestSignature;

/// What to serve once every interaction matching a signature was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExhaustedPolicy {
    /// Keep serving the last matching interaction.
    #[default]
    RepeatLast,
    /// Report no match.
    NoMatch,
}

/// Caller-chosen replay behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Behavior after a signature's matches are exhausted.
    pub exhausted: ExhaustedPolicy,
}

/// Replays interactions from a loaded scenario.
///
/// Interactions are queued per canonical signature in recorded order. Each
/// lookup consumes the next queued interaction, so the same query executed
/// twice during recording is answered with each recorded result in turn.
#[derive(Debug)]
pub struct ScenarioReplayer {
    scenario: Arc<Scenario>,
    options: ReplayOptions,
    by_id: HashMap<String, usize>,
    queues: HashMap<RequestSignature, Vec<usize>>,
    cursors: HashMap<RequestSignature, usize>,
    served: usize,
    unmatched: usize,
}

impl ScenarioReplayer {
    /// Indexes the scenario's interactions by identifier and by signature.
    #[must_use]
    pub fn new(scenario: Arc<Scenario>, options: ReplayOptions) -> Self {
        let mut by_id = HashMap::with_capacity(scenario.interactions.len());
        let mut queues: HashMap<RequestSignature, Vec<usize>> = HashMap::new();
        for (index, interaction) in scenario.interactions.iter().enumerate() {
            by_id.insert(interaction.id.clone(), index);
            queues.entry(RequestSignature::of(interaction).canonical()).or_default().push(index);
        }
        let cursors = queues.keys().map(|k| (k.clone(), 0)).collect();
        Self { scenario, options, by_id, queues, cursors, served: 0, unmatched: 0 }
    }

    /// The scenario being replayed.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Exact lookup by interaction identifier. Does not move any cursor.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&Interaction> {
        self.by_id.get(id).map(|&index| &self.scenario.interactions[index])
    }

    /// Returns the next recorded interaction matching `signature`, if any.
    pub fn next_match(&mut self, signature: &RequestSignature) -> Option<&Interaction> {
        let key = signature.canonical();
        let index = self.queues.get(&key).and_then(|queue| {
            let cursor = self.cursors.entry(key.clone()).or_insert(0);
            if let Some(&index) = queue.get(*cursor) {
                *cursor += 1;
                Some(index)
            } else {
                match self.options.exhausted {
                    ExhaustedPolicy::RepeatLast => queue.last().copied(),
                    ExhaustedPolicy::NoMatch => None,
                }
            }
        });

        if index.is_some() {
            self.served += 1;
        } else {
            self.unmatched += 1;
        }
        index.map(|index| &self.scenario.interactions[index])
    }

    /// Number of lookups answered so far.
    #[must_use]
    pub const fn served(&self) -> usize {
        self.served
    }

    /// Number of lookups that found no match.
    #[must_use]
    pub const fn unmatched(&self) -> usize {
        self.unmatched
    }

    /// Number of recorded interactions never served.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queues
            .iter()
            .map(|(key, queue)| queue.len().saturating_sub(self.cursors.get(key).copied().unwrap_or(0)))
            .sum()
    }
}
