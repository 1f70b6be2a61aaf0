//! Validation Registry
//!
//! Request/response attestation ledger. An agent's controller opens a request
//! handle naming a validator; only that validator may answer it, as often as
//! it likes. The first request fixes the (validator, agent) binding.

use std::collections::HashMap;

use ethers::types::{Address, H256};

use eip8004_types::{
    AgentId, MAX_VALIDATION_RESPONSE, RegistryError, RegistryEvent, RegistryResult,
    ValidationState, ValidationStatus, ValidationSummary,
};

use crate::context::CallContext;
use crate::events::EventLog;
use crate::identity::IdentityView;

#[derive(Debug, Clone)]
struct ValidationRecord {
    validator: Address,
    agent_id: AgentId,
    response: u8,
    response_hash: H256,
    tag: String,
    last_update: u64,
    has_response: bool,
}

impl ValidationRecord {
    fn state(&self) -> ValidationState {
        if self.has_response {
            ValidationState::Responded
        } else {
            ValidationState::Requested
        }
    }

    fn to_status(&self) -> ValidationStatus {
        ValidationStatus {
            validator_address: self.validator,
            agent_id: self.agent_id,
            response: self.response,
            response_hash: self.response_hash,
            tag: self.tag.clone(),
            last_update: self.last_update,
            state: self.state(),
        }
    }
}

fn request_not_found(request_hash: H256) -> RegistryError {
    RegistryError::not_found(format!("Validation request {:?} does not exist", request_hash))
}

pub struct ValidationRegistry {
    records: HashMap<H256, ValidationRecord>,
    agent_requests: HashMap<AgentId, Vec<H256>>,
    validator_requests: HashMap<Address, Vec<H256>>,
    events: EventLog,
}

impl Default for ValidationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            agent_requests: HashMap::new(),
            validator_requests: HashMap::new(),
            events: EventLog::new("Validation"),
        }
    }

    /// Open (or re-announce) a validation request for `agent_id`.
    ///
    /// Repeating an existing handle changes nothing but still emits
    /// `ValidationRequest` with the originally bound validator and agent.
    /// Only a caller authorized for the bound agent may repeat it.
    pub fn validation_request(
        &mut self,
        identity: &dyn IdentityView,
        ctx: &CallContext,
        validator: Address,
        agent_id: AgentId,
        request_uri: &str,
        request_hash: H256,
    ) -> RegistryResult<()> {
        if validator.is_zero() {
            return Err(RegistryError::invalid("Validator cannot be the zero address"));
        }
        if request_hash.is_zero() {
            return Err(RegistryError::invalid("Request hash cannot be zero"));
        }
        if !identity.is_authorized(ctx.sender, agent_id)? {
            return Err(RegistryError::unauthorized(format!(
                "{:?} cannot request validation for agent {}",
                ctx.sender, agent_id
            )));
        }

        let (bound_validator, bound_agent) = match self.records.get(&request_hash) {
            Some(existing) => {
                if existing.agent_id != agent_id
                    && !identity.is_authorized(ctx.sender, existing.agent_id)?
                {
                    return Err(RegistryError::unauthorized(format!(
                        "{:?} cannot re-announce request {:?} bound to agent {}",
                        ctx.sender, request_hash, existing.agent_id
                    )));
                }
                log::debug!(
                    "[Validation] Request {:?} already bound to {:?} / agent {}",
                    request_hash,
                    existing.validator,
                    existing.agent_id
                );
                (existing.validator, existing.agent_id)
            }
            None => {
                self.records.insert(
                    request_hash,
                    ValidationRecord {
                        validator,
                        agent_id,
                        response: 0,
                        response_hash: H256::zero(),
                        tag: String::new(),
                        last_update: 0,
                        has_response: false,
                    },
                );
                self.agent_requests
                    .entry(agent_id)
                    .or_default()
                    .push(request_hash);
                self.validator_requests
                    .entry(validator)
                    .or_default()
                    .push(request_hash);
                log::info!(
                    "[Validation] Agent {} requested validation {:?} from {:?}",
                    agent_id,
                    request_hash,
                    validator
                );
                (validator, agent_id)
            }
        };

        self.events.emit(RegistryEvent::ValidationRequest {
            validator_address: bound_validator,
            agent_id: bound_agent,
            request_uri: request_uri.to_string(),
            request_hash,
        });
        Ok(())
    }

    /// Record (or replace) the bound validator's answer to a request
    pub fn validation_response(
        &mut self,
        ctx: &CallContext,
        request_hash: H256,
        response: u8,
        response_uri: &str,
        response_hash: H256,
        tag: &str,
    ) -> RegistryResult<()> {
        let record = self
            .records
            .get_mut(&request_hash)
            .ok_or_else(|| request_not_found(request_hash))?;
        if record.validator != ctx.sender {
            return Err(RegistryError::unauthorized(format!(
                "{:?} is not the validator of request {:?}",
                ctx.sender, request_hash
            )));
        }
        if response > MAX_VALIDATION_RESPONSE {
            return Err(RegistryError::invalid(format!(
                "Response {} exceeds {}",
                response, MAX_VALIDATION_RESPONSE
            )));
        }

        record.response = response;
        record.response_hash = response_hash;
        record.tag = tag.to_string();
        record.last_update = ctx.timestamp;
        record.has_response = true;
        let agent_id = record.agent_id;

        self.events.emit(RegistryEvent::ValidationResponse {
            validator_address: ctx.sender,
            agent_id,
            request_hash,
            response,
            response_uri: response_uri.to_string(),
            response_hash,
            tag: tag.to_string(),
        });
        log::info!(
            "[Validation] {:?} answered {:?} for agent {} with {}",
            ctx.sender,
            request_hash,
            agent_id,
            response
        );
        Ok(())
    }

    pub fn get_validation_status(&self, request_hash: H256) -> RegistryResult<ValidationStatus> {
        self.records
            .get(&request_hash)
            .map(ValidationRecord::to_status)
            .ok_or_else(|| request_not_found(request_hash))
    }

    /// Count and floored mean score of the agent's answered requests,
    /// optionally narrowed to `validators` and an exact `tag`.
    pub fn get_summary(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
        validators: &[Address],
        tag: &str,
    ) -> RegistryResult<ValidationSummary> {
        identity.require_agent(agent_id)?;

        let mut count = 0u64;
        let mut total = 0u64;
        for request_hash in self.agent_requests.get(&agent_id).into_iter().flatten() {
            let Some(record) = self.records.get(request_hash) else {
                continue;
            };
            if !record.has_response {
                continue;
            }
            if !validators.is_empty() && !validators.contains(&record.validator) {
                continue;
            }
            if !tag.is_empty() && record.tag != tag {
                continue;
            }
            count += 1;
            total += u64::from(record.response);
        }

        let average_response = if count == 0 { 0 } else { (total / count) as u8 };
        Ok(ValidationSummary {
            count,
            average_response,
        })
    }

    /// Request handles bound to the agent, oldest first
    pub fn get_agent_validations(
        &self,
        identity: &dyn IdentityView,
        agent_id: AgentId,
    ) -> RegistryResult<Vec<H256>> {
        identity.require_agent(agent_id)?;
        Ok(self
            .agent_requests
            .get(&agent_id)
            .cloned()
            .unwrap_or_default())
    }

    pub fn get_validator_requests(&self, validator: Address) -> Vec<H256> {
        self.validator_requests
            .get(&validator)
            .cloned()
            .unwrap_or_default()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }
}
