//! Reputation Registry
//!
//! Append-only feedback ledger. Each (agent, client) pair owns a gapless
//! index sequence starting at 1; entries are never deleted and only their
//! revocation flag changes after write. Responses from anyone may be
//! attached to any existing entry.

use std::collections::HashMap;

use ethers::types::{Address, H256, I256};

use eip8004_types::{
    AgentId, FeedbackEntry, FeedbackListing, FeedbackSubmission, FeedbackSummary,
    MAX_VALUE_DECIMALS, RegistryError, RegistryEvent, RegistryResult, ResponseRecord,
};

use crate::context::CallContext;
use crate::events::EventLog;
use crate::identity::IdentityView;

/// Largest accepted feedback magnitude (1e38)
pub const MAX_ABS_FEEDBACK_VALUE: i128 = 100_000_000_000_000_000_000_000_000_000_000_000_000;

#[derive(Debug, Clone)]
struct FeedbackRecord {
    value: i128,
    value_decimals: u8,
    tag1: String,
    tag2: String,
    is_revoked: bool,
}

impl FeedbackRecord {
    fn matches_tags(&self, tag1: &str, tag2: &str) -> bool {
        (tag1.is_empty() || self.tag1 == tag1) && (tag2.is_empty() || self.tag2 == tag2)
    }

    fn to_entry(&self) -> FeedbackEntry {
        FeedbackEntry {
            value: self.value,
            value_decimals: self.value_decimals,
            tag1: self.tag1.clone(),
            tag2: self.tag2.clone(),
            is_revoked: self.is_revoked,
        }
    }
}

pub struct ReputationRegistry {
    feedback: Vec<FeedbackRecord>,
    /// (agent, client) -> arena slots; position `i` holds feedback index `i + 1`
    feedback_slots: HashMap<(AgentId, Address), Vec<usize>>,
    /// Clients in order of their first feedback per agent
    clients: HashMap<AgentId, Vec<Address>>,
    responses: Vec<ResponseRecord>,
    response_slots: HashMap<(AgentId, Address, u64), Vec<usize>>,
    events: EventLog,
}

impl Default for ReputationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReputationRegistry {
    pub fn new() -> Self {
        Self {
            feedback: Vec::new(),
            feedback_slots: HashMap::new(),
            clients: HashMap::new(),
            responses: Vec::new(),
            response_slots: HashMap::new(),
            events: EventLog::new("Reputation"),
        }
    }

    fn client_slots(&self, agent_id: AgentId, client: Address) -> &[usize] {
        self.feedback_slots
            .get(&(agent_id, client))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn slot(&self, agent_id: AgentId, client: Address, feedback_index: u64) -> RegistryResult<usize> {
        feedback_index
            .checked_sub(1)
            .and_then(|position| self.client_slots(agent_id, client).get(position as usize))
            .copied()
            .ok_or_else(|| {
                RegistryError::not_found(format!(
                    "Feedback {} from {:?} on agent {} does not exist",
                    feedback_index, client, agent_id
                ))
            })
    }

    fn known_clients(&self, agent_id: AgentId) -> &[Address] {
        self.clients
            .get(&agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // =====================================================
    // Writes
    // =====================================================

    /// Record feedback from the caller; returns its per-client index
    pub fn give_feedback(
        &mut self,
        identity: &dyn IdentityView,
        ctx: &CallContext,
        agent_id: AgentId,
        submission: FeedbackSubmission,
    ) -> RegistryResult<u64> {
        identity.require_agent(agent_id)?;
        if submission.value_decimals > MAX_VALUE_DECIMALS {
            return Err(RegistryError::invalid(format!(
                "valueDecimals {} exceeds {}",
                submission.value_decimals, MAX_VALUE_DECIMALS
            )));
        }
        if submission.value.unsigned_abs() > MAX_ABS_FEEDBACK_VALUE.unsigned_abs() {
            return Err(RegistryError::invalid(format!(
                "Feedback value {} is out of range",
                submission.value
            )));
        }
        if identity.is_authorized(ctx.sender, agent_id)? {
            return Err(RegistryError::unauthorized(format!(
                "{:?} controls agent {} and cannot rate it",
                ctx.sender, agent_id
            )));
        }

        let slot = self.feedback.len();
        self.feedback.push(FeedbackRecord {
            value: submission.value,
            value_decimals: submission.value_decimals,
            tag1: submission.tag1.clone(),
            tag2: submission.tag2.clone(),
            is_revoked: false,
        });

        let slots = self.feedback_slots.entry((agent_id, ctx.sender)).or_default();
        if slots.is_empty() {
            self.clients.entry(agent_id).or_default().push(ctx.sender);
        }
        slots.push(slot);
        let feedback_index = slots.len() as u64;

        log::info!(
            "[Reputation] Feedback {} from {:?} on agent {}: {} (decimals {})",
            feedback_index,
            ctx.sender,
            agent_id,
            submission.value,
            submission.value_decimals
        );

        self.events.emit(RegistryEvent::NewFeedback {
            agent_id,
            client_address: ctx.sender,
            feedback_index,
            value: submission.value,
            value_decimals: submission.value_decimals,
            tag1: submission.tag1,
            tag2: submission.tag2,
            endpoint: submission.endpoint,
            feedback_uri: submission.feedback_uri,
            feedback_hash: submission.feedback_hash,
        });
        Ok(feedback_index)
    }

    /// Revoke one of the caller's own feedback entries
    pub fn revoke_feedback(
        &mut self,
        identity: &dyn IdentityView,
        ctx: &CallContext,
        agent_id: AgentId,
        feedback_index: u64,
    ) -> RegistryResult<()> {
        identity.require_agent(agent_id)?;
        let slot = self.slot(agent_id, ctx.sender, feedback_index)?;
        let record = &mut self.feedback[slot];
        if record.is_revoked {
            return Err(RegistryError::invalid(format!(
                "Feedback {} on agent {} is already revoked",
                feedback_index, agent_id
            )));
        }
        record.is_revoked = true;

        self.events.emit(RegistryEvent::FeedbackRevoked {
            agent_id,
            client_address: ctx.sender,
            feedback_index,
        });
        log::info!(
            "[Reputation] Feedback {} from {:?} on agent {} revoked",
            feedback_index,
            ctx.sender,
            agent_id
        );
        Ok(())
    }

    /// Attach a response to an existing feedback entry. Anyone may respond.
    #[allow(clippy::too_many_arguments)]
    pub fn append_response(
        &mut self,
        identity: &dyn IdentityView,
        ctx: &CallContext,
        agent_id: AgentId,
        client: Address,
        feedback_index: u64,
        response_uri: &str,
        response_hash: H256,
    ) -> RegistryResult<()> {
        identity.require_agent(agent_id)?;
        self.slot(agent_id, client, feedback_index)?;

        let slot = self.responses.len();
        self.responses.push(ResponseRecord {
            responder: ctx.sender,
            response_uri: response_uri.to_string(),
            response_hash,
        });
        self.response_slots
            .entry((agent_id, client, feedback_index))
            .or_default()
            .push(slot);

        self.events.emit(RegistryEvent::ResponseAppended {
            agent_id,
            client_address: client,
            feedback_index,
            responder: ctx.sender,
            response_uri: response_uri.to_string(),
            response_hash,
        });
        log::debug!(
            "[Reputation] {:?} responded to feedback {} from {:?} on agent {}",
            ctx.sender,
            feedback_index,
            client,
            agent_id
        );
        Ok(())
    }

    // =====================================================
    // Reads
    // =====================================================

    /// Count and widened sum of non-revoked feedback from `clients`.
    ///
    /// Empty tag filters match everything. Decimals are taken from the first
    /// matching entry; mixed decimals are summed as-is.
    pub fn get_summary(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        clients: &[Address],
        tag1: &str,
        tag2: &str,
    ) -> RegistryResult<FeedbackSummary> {
        identity.require_agent(agent_id)?;
        if clients.is_empty() {
            return Err(RegistryError::invalid("Summary requires at least one client"));
        }

        let mut summary = FeedbackSummary::empty();
        for client in clients {
            for &slot in self.client_slots(agent_id, *client) {
                let record = &self.feedback[slot];
                if record.is_revoked || !record.matches_tags(tag1, tag2) {
                    continue;
                }
                if summary.count == 0 {
                    summary.summary_value_decimals = record.value_decimals;
                }
                summary.summary_value += I256::from(record.value);
                summary.count += 1;
            }
        }
        Ok(summary)
    }

    /// Flattened feedback listing; empty `clients` means every known client.
    pub fn read_all_feedback(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        clients: &[Address],
        tag1: &str,
        tag2: &str,
        include_revoked: bool,
    ) -> RegistryResult<FeedbackListing> {
        identity.require_agent(agent_id)?;
        let clients = if clients.is_empty() {
            self.known_clients(agent_id)
        } else {
            clients
        };
        let keep = |record: &FeedbackRecord| {
            (include_revoked || !record.is_revoked) && record.matches_tags(tag1, tag2)
        };

        let total: usize = clients
            .iter()
            .map(|client| {
                self.client_slots(agent_id, *client)
                    .iter()
                    .filter(|&&slot| keep(&self.feedback[slot]))
                    .count()
            })
            .sum();

        let mut listing = FeedbackListing::with_capacity(total);
        for client in clients {
            for (position, &slot) in self.client_slots(agent_id, *client).iter().enumerate() {
                let record = &self.feedback[slot];
                if !keep(record) {
                    continue;
                }
                listing.clients.push(*client);
                listing.feedback_indexes.push(position as u64 + 1);
                listing.values.push(record.value);
                listing.value_decimals.push(record.value_decimals);
                listing.tag1s.push(record.tag1.clone());
                listing.tag2s.push(record.tag2.clone());
                listing.revoked_statuses.push(record.is_revoked);
            }
        }
        Ok(listing)
    }

    pub fn read_feedback(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        client: Address,
        feedback_index: u64,
    ) -> RegistryResult<FeedbackEntry> {
        identity.require_agent(agent_id)?;
        let slot = self.slot(agent_id, client, feedback_index)?;
        Ok(self.feedback[slot].to_entry())
    }

    /// Highest index issued to `client` on `agent_id`, 0 if none
    pub fn get_last_index(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        client: Address,
    ) -> RegistryResult<u64> {
        identity.require_agent(agent_id)?;
        Ok(self.client_slots(agent_id, client).len() as u64)
    }

    pub fn get_clients(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
    ) -> RegistryResult<Vec<Address>> {
        identity.require_agent(agent_id)?;
        Ok(self.known_clients(agent_id).to_vec())
    }

    pub fn get_responses(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        client: Address,
        feedback_index: u64,
    ) -> RegistryResult<Vec<ResponseRecord>> {
        identity.require_agent(agent_id)?;
        self.slot(agent_id, client, feedback_index)?;
        Ok(self
            .response_slots
            .get(&(agent_id, client, feedback_index))
            .map(|slots| slots.iter().map(|&slot| self.responses[slot].clone()).collect())
            .unwrap_or_default())
    }

    /// Number of responses, narrowed by client (`None` = all), feedback index
    /// (0 = all) and responders (empty = all).
    pub fn get_response_count(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        client: Option<Address>,
        feedback_index: u64,
        responders: &[Address],
    ) -> RegistryResult<u64> {
        identity.require_agent(agent_id)?;
        let clients = match client {
            Some(client) => vec![client],
            None => self.known_clients(agent_id).to_vec(),
        };

        let mut count = 0u64;
        for client in clients {
            let last = self.client_slots(agent_id, client).len() as u64;
            let indexes = if feedback_index == 0 {
                1..=last
            } else {
                feedback_index..=feedback_index.min(last)
            };
            for index in indexes {
                let Some(slots) = self.response_slots.get(&(agent_id, client, index)) else {
                    continue;
                };
                count += slots
                    .iter()
                    .filter(|&&slot| {
                        responders.is_empty() || responders.contains(&self.responses[slot].responder)
                    })
                    .count() as u64;
            }
        }
        Ok(count)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }
}
