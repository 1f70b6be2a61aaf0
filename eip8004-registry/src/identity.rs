//! Identity Registry
//!
//! Mints agent identifiers and tracks ownership, delegation, per-agent
//! metadata and the agent's bound operating wallet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ethers::types::{Address, Bytes, H256};

use eip8004_types::{
    AGENT_WALLET_METADATA_KEY, AgentId, MetadataEntry, RegistryError, RegistryEvent,
    RegistryResult,
};

use crate::abi::{decode_address_packed, encode_address_packed};
use crate::config::RegistryConfig;
use crate::context::CallContext;
use crate::credential::{ContractAccounts, WalletCredential};
use crate::eip712::{AgentWalletSet, Eip712Domain};
use crate::events::EventLog;

/// Read-only view of the identity registry used by the other ledgers.
pub trait IdentityView {
    fn agent_exists(&self, agent_id: AgentId) -> bool;

    /// Owner, owner-approved operator or approved delegate of `agent_id`
    fn is_authorized(&self, caller: Address, agent_id: AgentId) -> RegistryResult<bool>;

    fn require_agent(&self, agent_id: AgentId) -> RegistryResult<()> {
        if self.agent_exists(agent_id) {
            Ok(())
        } else {
            Err(agent_not_found(agent_id))
        }
    }
}

pub(crate) fn agent_not_found(agent_id: AgentId) -> RegistryError {
    RegistryError::not_found(format!("Agent {} does not exist", agent_id))
}

#[derive(Debug, Clone)]
struct AgentRecord {
    owner: Address,
    approved: Option<Address>,
    uri: String,
    metadata: HashMap<String, Bytes>,
}

pub struct IdentityRegistry {
    domain: Eip712Domain,
    max_deadline_delay_secs: u64,
    contracts: Arc<dyn ContractAccounts>,
    /// Agent `n` lives at index `n - 1`
    agents: Vec<AgentRecord>,
    operators: HashMap<Address, HashSet<Address>>,
    balances: HashMap<Address, u64>,
    events: EventLog,
}

impl IdentityRegistry {
    pub fn new(
        domain: Eip712Domain,
        max_deadline_delay_secs: u64,
        contracts: Arc<dyn ContractAccounts>,
    ) -> Self {
        Self {
            domain,
            max_deadline_delay_secs,
            contracts,
            agents: Vec::new(),
            operators: HashMap::new(),
            balances: HashMap::new(),
            events: EventLog::new("Identity"),
        }
    }

    pub fn from_config(
        config: &RegistryConfig,
        contracts: Arc<dyn ContractAccounts>,
    ) -> RegistryResult<Self> {
        Ok(Self::new(
            config.eip712_domain()?,
            config.max_deadline_delay_secs,
            contracts,
        ))
    }

    fn record(&self, agent_id: AgentId) -> RegistryResult<&AgentRecord> {
        agent_id
            .checked_sub(1)
            .and_then(|slot| self.agents.get(slot as usize))
            .ok_or_else(|| agent_not_found(agent_id))
    }

    fn record_mut(&mut self, agent_id: AgentId) -> RegistryResult<&mut AgentRecord> {
        agent_id
            .checked_sub(1)
            .and_then(|slot| self.agents.get_mut(slot as usize))
            .ok_or_else(|| agent_not_found(agent_id))
    }

    fn require_authorized(&self, caller: Address, agent_id: AgentId) -> RegistryResult<()> {
        if self.is_authorized(caller, agent_id)? {
            Ok(())
        } else {
            Err(RegistryError::unauthorized(format!(
                "{:?} is not owner, operator or approved for agent {}",
                caller, agent_id
            )))
        }
    }

    pub fn is_authorized(&self, caller: Address, agent_id: AgentId) -> RegistryResult<bool> {
        let record = self.record(agent_id)?;
        Ok(caller == record.owner
            || self.is_approved_for_all(record.owner, caller)
            || record.approved == Some(caller))
    }

    pub fn agent_exists(&self, agent_id: AgentId) -> bool {
        self.record(agent_id).is_ok()
    }

    // =====================================================
    // Registration and ownership
    // =====================================================

    /// Mint the next agent id to the caller
    pub fn register(
        &mut self,
        ctx: &CallContext,
        agent_uri: &str,
        metadata: &[MetadataEntry],
    ) -> RegistryResult<AgentId> {
        if ctx.sender.is_zero() {
            return Err(RegistryError::invalid("Cannot register to the zero address"));
        }
        if metadata
            .iter()
            .any(|entry| entry.metadata_key == AGENT_WALLET_METADATA_KEY)
        {
            return Err(RegistryError::invalid(format!(
                "Metadata key '{}' is reserved",
                AGENT_WALLET_METADATA_KEY
            )));
        }

        let agent_id = self.agents.len() as AgentId + 1;
        let mut record = AgentRecord {
            owner: ctx.sender,
            approved: None,
            uri: agent_uri.to_string(),
            metadata: HashMap::with_capacity(metadata.len() + 1),
        };
        for entry in metadata {
            record
                .metadata
                .insert(entry.metadata_key.clone(), entry.metadata_value.clone());
        }
        let wallet = encode_address_packed(ctx.sender);
        record
            .metadata
            .insert(AGENT_WALLET_METADATA_KEY.to_string(), wallet.clone());

        self.agents.push(record);
        *self.balances.entry(ctx.sender).or_default() += 1;

        self.events.emit(RegistryEvent::Transfer {
            from: Address::zero(),
            to: ctx.sender,
            agent_id,
        });
        self.events.emit(RegistryEvent::Registered {
            agent_id,
            agent_uri: agent_uri.to_string(),
            owner: ctx.sender,
        });
        for entry in metadata {
            self.events.emit(RegistryEvent::MetadataSet {
                agent_id,
                metadata_key: entry.metadata_key.clone(),
                metadata_value: entry.metadata_value.clone(),
            });
        }
        self.events.emit(RegistryEvent::MetadataSet {
            agent_id,
            metadata_key: AGENT_WALLET_METADATA_KEY.to_string(),
            metadata_value: wallet,
        });

        log::info!(
            "[Identity] Registered agent {} for {:?} ({} metadata entries)",
            agent_id,
            ctx.sender,
            metadata.len()
        );
        Ok(agent_id)
    }

    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        from: Address,
        to: Address,
        agent_id: AgentId,
    ) -> RegistryResult<()> {
        self.require_authorized(ctx.sender, agent_id)?;
        let owner = self.record(agent_id)?.owner;
        if owner != from {
            return Err(RegistryError::invalid(format!(
                "Agent {} is owned by {:?}, not {:?}",
                agent_id, owner, from
            )));
        }
        if to.is_zero() {
            return Err(RegistryError::invalid("Cannot transfer to the zero address"));
        }

        let record = self.record_mut(agent_id)?;
        record.owner = to;
        record.approved = None;
        record.metadata.remove(AGENT_WALLET_METADATA_KEY);

        if let Some(balance) = self.balances.get_mut(&from) {
            *balance = balance.saturating_sub(1);
        }
        *self.balances.entry(to).or_default() += 1;

        self.events.emit(RegistryEvent::Transfer { from, to, agent_id });
        self.events.emit(RegistryEvent::MetadataSet {
            agent_id,
            metadata_key: AGENT_WALLET_METADATA_KEY.to_string(),
            metadata_value: Bytes::new(),
        });

        log::info!(
            "[Identity] Agent {} transferred {:?} -> {:?}, wallet unbound",
            agent_id,
            from,
            to
        );
        Ok(())
    }

    pub fn owner_of(&self, agent_id: AgentId) -> RegistryResult<Address> {
        Ok(self.record(agent_id)?.owner)
    }

    pub fn balance_of(&self, owner: Address) -> RegistryResult<u64> {
        if owner.is_zero() {
            return Err(RegistryError::invalid("Zero address is not a valid owner"));
        }
        Ok(self.balances.get(&owner).copied().unwrap_or(0))
    }

    pub fn total_agents(&self) -> u64 {
        self.agents.len() as u64
    }

    // =====================================================
    // Delegation
    // =====================================================

    /// Approve a single delegate for `agent_id`; the zero address clears it
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        approved: Address,
        agent_id: AgentId,
    ) -> RegistryResult<()> {
        self.require_authorized(ctx.sender, agent_id)?;

        let record = self.record_mut(agent_id)?;
        record.approved = if approved.is_zero() {
            None
        } else {
            Some(approved)
        };
        let owner = record.owner;

        self.events.emit(RegistryEvent::Approval {
            owner,
            approved,
            agent_id,
        });
        log::info!("[Identity] Agent {} delegate set to {:?}", agent_id, approved);
        Ok(())
    }

    pub fn get_approved(&self, agent_id: AgentId) -> RegistryResult<Option<Address>> {
        Ok(self.record(agent_id)?.approved)
    }

    /// Grant or revoke `operator` over every agent the caller owns
    pub fn set_approval_for_all(
        &mut self,
        ctx: &CallContext,
        operator: Address,
        approved: bool,
    ) -> RegistryResult<()> {
        if operator.is_zero() {
            return Err(RegistryError::invalid("Operator cannot be the zero address"));
        }

        if approved {
            self.operators.entry(ctx.sender).or_default().insert(operator);
        } else if let Some(set) = self.operators.get_mut(&ctx.sender) {
            set.remove(&operator);
        }

        self.events.emit(RegistryEvent::ApprovalForAll {
            owner: ctx.sender,
            operator,
            approved,
        });
        log::info!(
            "[Identity] Operator {:?} {} for owner {:?}",
            operator,
            if approved { "approved" } else { "revoked" },
            ctx.sender
        );
        Ok(())
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operators
            .get(&owner)
            .map(|set| set.contains(&operator))
            .unwrap_or(false)
    }

    // =====================================================
    // URI and metadata
    // =====================================================

    pub fn set_agent_uri(
        &mut self,
        ctx: &CallContext,
        agent_id: AgentId,
        new_uri: &str,
    ) -> RegistryResult<()> {
        self.require_authorized(ctx.sender, agent_id)?;
        self.record_mut(agent_id)?.uri = new_uri.to_string();

        self.events.emit(RegistryEvent::UriUpdated {
            agent_id,
            new_uri: new_uri.to_string(),
            updated_by: ctx.sender,
        });
        log::info!("[Identity] Agent {} URI updated to '{}'", agent_id, new_uri);
        Ok(())
    }

    /// Agent URI; empty when none was given
    pub fn agent_uri(&self, agent_id: AgentId) -> RegistryResult<String> {
        Ok(self.record(agent_id)?.uri.clone())
    }

    pub fn set_metadata(
        &mut self,
        ctx: &CallContext,
        agent_id: AgentId,
        key: &str,
        value: Bytes,
    ) -> RegistryResult<()> {
        self.require_authorized(ctx.sender, agent_id)?;
        if key == AGENT_WALLET_METADATA_KEY {
            return Err(RegistryError::invalid(format!(
                "Metadata key '{}' is reserved, use set_agent_wallet",
                AGENT_WALLET_METADATA_KEY
            )));
        }

        self.record_mut(agent_id)?
            .metadata
            .insert(key.to_string(), value.clone());

        self.events.emit(RegistryEvent::MetadataSet {
            agent_id,
            metadata_key: key.to_string(),
            metadata_value: value,
        });
        log::debug!("[Identity] Agent {} metadata '{}' set", agent_id, key);
        Ok(())
    }

    /// Metadata value; unset keys read as empty bytes
    pub fn get_metadata(&self, agent_id: AgentId, key: &str) -> RegistryResult<Bytes> {
        Ok(self
            .record(agent_id)?
            .metadata
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    // =====================================================
    // Wallet binding
    // =====================================================

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn domain_separator(&self) -> H256 {
        self.domain.separator()
    }

    /// Digest `new_wallet` must sign to consent to the binding
    pub fn wallet_binding_digest(
        &self,
        agent_id: AgentId,
        new_wallet: Address,
        deadline: u64,
    ) -> H256 {
        AgentWalletSet {
            agent_id,
            new_wallet,
            deadline,
        }
        .digest(&self.domain)
    }

    /// Bind `new_wallet` as the agent's operating wallet.
    ///
    /// `credential` proves the wallet's consent: a signature for key-bound
    /// wallets, or whatever the wallet's contract accepts via ERC-1271.
    /// Verification completes before the binding is written.
    pub fn set_agent_wallet(
        &mut self,
        ctx: &CallContext,
        agent_id: AgentId,
        new_wallet: Address,
        deadline: u64,
        credential: &[u8],
    ) -> RegistryResult<()> {
        self.require_authorized(ctx.sender, agent_id)?;
        if new_wallet.is_zero() {
            return Err(RegistryError::invalid(
                "Wallet cannot be the zero address, use unset_agent_wallet",
            ));
        }
        if ctx.timestamp > deadline {
            return Err(RegistryError::signature(format!(
                "Credential expired at {} (now {})",
                deadline, ctx.timestamp
            )));
        }
        if deadline > ctx.timestamp.saturating_add(self.max_deadline_delay_secs) {
            return Err(RegistryError::signature(format!(
                "Deadline {} is more than {}s ahead",
                deadline, self.max_deadline_delay_secs
            )));
        }

        let digest = self.wallet_binding_digest(agent_id, new_wallet, deadline);
        let contracts = Arc::clone(&self.contracts);
        let wallet_credential = WalletCredential::resolve(new_wallet, contracts.as_ref());
        if let Err(e) = wallet_credential.verify(self, digest, credential) {
            log::warn!(
                "[Identity] Rejected {} wallet {:?} for agent {}: {}",
                if wallet_credential.is_contract() { "contract" } else { "key-bound" },
                new_wallet,
                agent_id,
                e
            );
            return Err(e);
        }

        let packed = encode_address_packed(new_wallet);
        self.record_mut(agent_id)?
            .metadata
            .insert(AGENT_WALLET_METADATA_KEY.to_string(), packed.clone());

        self.events.emit(RegistryEvent::MetadataSet {
            agent_id,
            metadata_key: AGENT_WALLET_METADATA_KEY.to_string(),
            metadata_value: packed,
        });
        log::info!("[Identity] Agent {} wallet bound to {:?}", agent_id, new_wallet);
        Ok(())
    }

    pub fn unset_agent_wallet(&mut self, ctx: &CallContext, agent_id: AgentId) -> RegistryResult<()> {
        self.require_authorized(ctx.sender, agent_id)?;
        self.record_mut(agent_id)?
            .metadata
            .remove(AGENT_WALLET_METADATA_KEY);

        self.events.emit(RegistryEvent::MetadataSet {
            agent_id,
            metadata_key: AGENT_WALLET_METADATA_KEY.to_string(),
            metadata_value: Bytes::new(),
        });
        log::info!("[Identity] Agent {} wallet unbound", agent_id);
        Ok(())
    }

    pub fn get_agent_wallet(&self, agent_id: AgentId) -> RegistryResult<Option<Address>> {
        Ok(self
            .record(agent_id)?
            .metadata
            .get(AGENT_WALLET_METADATA_KEY)
            .and_then(|packed| decode_address_packed(packed)))
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }
}

impl IdentityView for IdentityRegistry {
    fn agent_exists(&self, agent_id: AgentId) -> bool {
        IdentityRegistry::agent_exists(self, agent_id)
    }

    fn is_authorized(&self, caller: Address, agent_id: AgentId) -> RegistryResult<bool> {
        IdentityRegistry::is_authorized(self, caller, agent_id)
    }
}
