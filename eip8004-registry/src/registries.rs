//! The three registries deployed together

use std::sync::Arc;

use ethers::types::{Address, H256};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use eip8004_types::{
    AgentId, FeedbackListing, FeedbackSubmission, FeedbackSummary, RegistryEvent,
    RegistryResult, ValidationSummary,
};

use crate::config::RegistryConfig;
use crate::context::CallContext;
use crate::credential::{ContractAccounts, NoContracts};
use crate::identity::IdentityRegistry;
use crate::reputation::ReputationRegistry;
use crate::validation::ValidationRegistry;

/// Identity, reputation and validation registries of one deployment.
///
/// Reputation and validation calls that consult identity state go through
/// here so the identity registry is only ever lent out read-only.
pub struct Registries {
    config: RegistryConfig,
    identity: IdentityRegistry,
    reputation: ReputationRegistry,
    validation: ValidationRegistry,
}

impl Registries {
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        Self::with_contracts(config, Arc::new(NoContracts))
    }

    /// Deploy with contract accounts able to answer ERC-1271 checks
    pub fn with_contracts(
        config: RegistryConfig,
        contracts: Arc<dyn ContractAccounts>,
    ) -> RegistryResult<Self> {
        let identity = IdentityRegistry::from_config(&config, contracts)?;
        log::info!(
            "[Registries] Deployed on {} (chain {}), identity registry {}",
            config.chain_name,
            config.chain_id,
            config.identity_registry
        );
        Ok(Self {
            config,
            identity,
            reputation: ReputationRegistry::new(),
            validation: ValidationRegistry::new(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityRegistry {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut IdentityRegistry {
        &mut self.identity
    }

    pub fn reputation(&self) -> &ReputationRegistry {
        &self.reputation
    }

    pub fn validation(&self) -> &ValidationRegistry {
        &self.validation
    }

    /// One receiver for the events of all three registries, in emission order
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.identity.events_mut().attach(tx.clone());
        self.reputation.events_mut().attach(tx.clone());
        self.validation.events_mut().attach(tx);
        rx
    }

    // =====================================================
    // Reputation
    // =====================================================

    pub fn give_feedback(
        &mut self,
        ctx: &CallContext,
        agent_id: AgentId,
        submission: FeedbackSubmission,
    ) -> RegistryResult<u64> {
        self.reputation
            .give_feedback(&self.identity, ctx, agent_id, submission)
    }

    pub fn revoke_feedback(
        &mut self,
        ctx: &CallContext,
        agent_id: AgentId,
        feedback_index: u64,
    ) -> RegistryResult<()> {
        self.reputation
            .revoke_feedback(&self.identity, ctx, agent_id, feedback_index)
    }

    pub fn append_response(
        &mut self,
        ctx: &CallContext,
        agent_id: AgentId,
        client: Address,
        feedback_index: u64,
        response_uri: &str,
        response_hash: H256,
    ) -> RegistryResult<()> {
        self.reputation.append_response(
            &self.identity,
            ctx,
            agent_id,
            client,
            feedback_index,
            response_uri,
            response_hash,
        )
    }

    pub fn feedback_summary(
        &self,
        agent_id: AgentId,
        clients: &[Address],
        tag1: &str,
        tag2: &str,
    ) -> RegistryResult<FeedbackSummary> {
        self.reputation
            .get_summary(&self.identity, agent_id, clients, tag1, tag2)
    }

    pub fn read_all_feedback(
        &self,
        agent_id: AgentId,
        clients: &[Address],
        tag1: &str,
        tag2: &str,
        include_revoked: bool,
    ) -> RegistryResult<FeedbackListing> {
        self.reputation.read_all_feedback(
            &self.identity,
            agent_id,
            clients,
            tag1,
            tag2,
            include_revoked,
        )
    }

    // =====================================================
    // Validation
    // =====================================================

    pub fn validation_request(
        &mut self,
        ctx: &CallContext,
        validator: Address,
        agent_id: AgentId,
        request_uri: &str,
        request_hash: H256,
    ) -> RegistryResult<()> {
        self.validation.validation_request(
            &self.identity,
            ctx,
            validator,
            agent_id,
            request_uri,
            request_hash,
        )
    }

    pub fn validation_response(
        &mut self,
        ctx: &CallContext,
        request_hash: H256,
        response: u8,
        response_uri: &str,
        response_hash: H256,
        tag: &str,
    ) -> RegistryResult<()> {
        self.validation.validation_response(
            ctx,
            request_hash,
            response,
            response_uri,
            response_hash,
            tag,
        )
    }

    pub fn validation_summary(
        &self,
        agent_id: AgentId,
        validators: &[Address],
        tag: &str,
    ) -> RegistryResult<ValidationSummary> {
        self.validation
            .get_summary(&self.identity, agent_id, validators, tag)
    }
}

/// Thread-safe handle; every call runs under one lock, so operations on the
/// registries are serialized.
#[derive(Clone)]
pub struct SharedRegistries {
    inner: Arc<RwLock<Registries>>,
}

impl SharedRegistries {
    pub fn new(registries: Registries) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registries)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Registries) -> R) -> R {
        f(&*self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Registries) -> R) -> R {
        f(&mut *self.inner.write())
    }
}
