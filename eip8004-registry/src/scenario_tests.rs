//! End-to-end flows across the three registries.
//!
//! Each test drives a full deployment through `Registries` and checks both the
//! returned state and the notification stream a subscriber observes.

use std::sync::Arc;

use ethers::types::{Address, H256, I256};
use tokio::sync::mpsc;

use crate::credential::{ContractDirectory, SignatureValidator};
use crate::{
    AGENT_WALLET_METADATA_KEY, AgentId, CallContext, ErrorKind, FeedbackSubmission,
    IdentityRegistry, Registries, RegistryConfig, RegistryEvent, ValidationState,
    WalletBindingSigner,
};

const NOW: u64 = 1_700_000_000;
// Hardhat account #2 (DO NOT USE IN PRODUCTION)
const OPERATING_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

fn owner() -> Address {
    Address::from_low_u64_be(0x0a)
}

fn client() -> Address {
    Address::from_low_u64_be(0xc1)
}

fn validator() -> Address {
    Address::from_low_u64_be(0x5a)
}

fn stranger() -> Address {
    Address::from_low_u64_be(0xee)
}

fn at(sender: Address) -> CallContext {
    CallContext::new(sender, NOW)
}

/// Deployment with one agent registered by `owner()` and a live subscriber
struct TestHarness {
    registries: Registries,
    events: mpsc::UnboundedReceiver<RegistryEvent>,
    agent: AgentId,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_registries(Registries::new(RegistryConfig::local(31337)).unwrap())
    }

    fn with_registries(mut registries: Registries) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let events = registries.subscribe();
        let agent = registries
            .identity_mut()
            .register(&at(owner()), "", &[])
            .unwrap();
        let mut harness = Self {
            registries,
            events,
            agent,
        };
        harness.drain();
        harness
    }

    fn drain(&mut self) -> Vec<RegistryEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

#[test]
fn registration_binds_owner_wallet() {
    let h = TestHarness::new();

    assert_eq!(h.agent, 1);
    assert_eq!(h.registries.identity().owner_of(h.agent).unwrap(), owner());
    assert_eq!(h.registries.identity().agent_uri(h.agent).unwrap(), "");
    assert_eq!(
        h.registries.identity().get_agent_wallet(h.agent).unwrap(),
        Some(owner())
    );
}

#[test]
fn feedback_summary_then_revocation() {
    let mut h = TestHarness::new();
    let agent = h.agent;

    let index = h
        .registries
        .give_feedback(
            &at(client()),
            agent,
            FeedbackSubmission::new(80, 0).with_tags("quality", ""),
        )
        .unwrap();
    assert_eq!(index, 1);

    let summary = h.registries.feedback_summary(agent, &[client()], "", "").unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.summary_value, I256::from(80i128));
    assert_eq!(summary.summary_value_decimals, 0);

    h.registries.revoke_feedback(&at(client()), agent, 1).unwrap();

    let summary = h.registries.feedback_summary(agent, &[client()], "", "").unwrap();
    assert_eq!(summary.count, 0);
    assert_eq!(summary.summary_value, I256::zero());

    let events = h.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name(), "NewFeedback");
    assert_eq!(
        events[1],
        RegistryEvent::FeedbackRevoked {
            agent_id: agent,
            client_address: client(),
            feedback_index: 1,
        }
    );

    // the entry survives revocation
    let listing = h
        .registries
        .read_all_feedback(agent, &[], "", "", true)
        .unwrap();
    assert_eq!(listing.revoked_statuses, vec![true]);
}

#[test]
fn validation_request_and_response() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    let request = H256::repeat_byte(0x11);

    h.registries
        .validation_request(&at(owner()), validator(), agent, "ipfs://work", request)
        .unwrap();
    h.registries
        .validation_response(
            &CallContext::new(validator(), NOW + 60),
            request,
            100,
            "ipfs://verdict",
            H256::repeat_byte(0x22),
            "verified",
        )
        .unwrap();

    let status = h.registries.validation().get_validation_status(request).unwrap();
    assert_eq!(status.validator_address, validator());
    assert_eq!(status.agent_id, agent);
    assert_eq!(status.response, 100);
    assert_eq!(status.tag, "verified");
    assert_eq!(status.last_update, NOW + 60);
    assert_eq!(status.state, ValidationState::Responded);
}

#[test]
fn validation_average_is_floored() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    let other_validator = Address::from_low_u64_be(0x5b);

    for (n, (who, score)) in [(validator(), 100u8), (other_validator, 50), (validator(), 51)]
        .into_iter()
        .enumerate()
    {
        let request = H256::from_low_u64_be(n as u64 + 1);
        h.registries
            .validation_request(&at(owner()), who, agent, "", request)
            .unwrap();
        if n < 2 {
            h.registries
                .validation_response(&at(who), request, score, "", H256::zero(), "")
                .unwrap();
        }
    }

    let summary = h.registries.validation_summary(agent, &[], "").unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.average_response, 75);

    // 100 + 50 + 51 = 201, 201 / 3 = 67
    h.registries
        .validation_response(&at(validator()), H256::from_low_u64_be(3), 51, "", H256::zero(), "")
        .unwrap();
    let summary = h.registries.validation_summary(agent, &[], "").unwrap();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.average_response, 67);
}

#[test]
fn stranger_cannot_request_validation() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    let request = H256::repeat_byte(0x33);

    let err = h
        .registries
        .validation_request(&at(stranger()), validator(), agent, "", request)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(
        h.registries
            .validation()
            .get_validation_status(request)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert!(h.drain().is_empty());
}

#[test]
fn controllers_cannot_rate_their_own_agent() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    let operator = Address::from_low_u64_be(0x0b);
    let delegate = Address::from_low_u64_be(0x0c);

    h.registries
        .identity_mut()
        .set_approval_for_all(&at(owner()), operator, true)
        .unwrap();
    h.registries
        .identity_mut()
        .approve(&at(owner()), delegate, agent)
        .unwrap();

    for who in [owner(), operator, delegate] {
        let err = h
            .registries
            .give_feedback(&at(who), agent, FeedbackSubmission::new(100, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }
    assert!(h.registries.reputation().get_clients(h.registries.identity(), agent).unwrap().is_empty());

    // delegates and operators may open validation requests
    h.registries
        .validation_request(&at(delegate), validator(), agent, "", H256::repeat_byte(1))
        .unwrap();
    h.registries
        .validation_request(&at(operator), validator(), agent, "", H256::repeat_byte(2))
        .unwrap();
}

#[test]
fn unminted_agent_is_not_found_everywhere() {
    let mut h = TestHarness::new();
    let missing = h.agent + 1;

    let errors = [
        h.registries.identity().owner_of(missing).unwrap_err(),
        h.registries.identity().get_metadata(missing, "name").unwrap_err(),
        h.registries
            .give_feedback(&at(client()), missing, FeedbackSubmission::new(1, 0))
            .unwrap_err(),
        h.registries.feedback_summary(missing, &[client()], "", "").unwrap_err(),
        h.registries
            .validation_request(&at(owner()), validator(), missing, "", H256::repeat_byte(1))
            .unwrap_err(),
        h.registries.validation_summary(missing, &[], "").unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[test]
fn transfer_unbinds_wallet_and_new_owner_rebinds() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    let new_owner = Address::from_low_u64_be(0x0d);
    let operating = WalletBindingSigner::from_private_key(OPERATING_KEY).unwrap();

    h.registries
        .identity_mut()
        .transfer_from(&at(owner()), owner(), new_owner, agent)
        .unwrap();
    assert_eq!(h.registries.identity().get_agent_wallet(agent).unwrap(), None);

    let events = h.drain();
    assert_eq!(
        events,
        vec![
            RegistryEvent::Transfer {
                from: owner(),
                to: new_owner,
                agent_id: agent,
            },
            RegistryEvent::MetadataSet {
                agent_id: agent,
                metadata_key: AGENT_WALLET_METADATA_KEY.to_string(),
                metadata_value: Default::default(),
            },
        ]
    );

    // the old owner has lost control
    let deadline = NOW + 120;
    let credential = operating
        .sign_wallet_binding(h.registries.identity().domain(), agent, deadline)
        .unwrap();
    let err = h
        .registries
        .identity_mut()
        .set_agent_wallet(&at(owner()), agent, operating.address(), deadline, &credential)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    h.registries
        .identity_mut()
        .set_agent_wallet(&at(new_owner), agent, operating.address(), deadline, &credential)
        .unwrap();
    assert_eq!(
        h.registries.identity().get_agent_wallet(agent).unwrap(),
        Some(operating.address())
    );

    // a credential is bound to its domain: another chain's signature fails
    let foreign = Registries::new(RegistryConfig::local(1)).unwrap();
    let foreign_credential = operating
        .sign_wallet_binding(foreign.identity().domain(), agent, deadline)
        .unwrap();
    let err = h
        .registries
        .identity_mut()
        .set_agent_wallet(&at(new_owner), agent, operating.address(), deadline, &foreign_credential)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);
}

/// Multisig-style wallet that approves any binding of the agent it serves,
/// provided that agent is currently controlled by `controller`.
struct GuardedWallet {
    agent: AgentId,
    controller: Address,
}

impl SignatureValidator for GuardedWallet {
    fn is_valid_signature(
        &self,
        registry: &IdentityRegistry,
        _hash: H256,
        _signature: &[u8],
    ) -> Result<[u8; 4], String> {
        let owner = registry.owner_of(self.agent).map_err(|e| e.to_string())?;
        if owner == self.controller {
            Ok(crate::abi::ERC1271_MAGIC_VALUE)
        } else {
            Ok([0; 4])
        }
    }
}

#[test]
fn contract_wallet_binding_through_callback() {
    let contract = Address::from_low_u64_be(0xc0de);
    let directory = ContractDirectory::new().with_contract(
        contract,
        GuardedWallet {
            agent: 1,
            controller: owner(),
        },
    );
    let registries =
        Registries::with_contracts(RegistryConfig::local(31337), Arc::new(directory)).unwrap();
    let mut h = TestHarness::with_registries(registries);
    let agent = h.agent;

    h.registries
        .identity_mut()
        .set_agent_wallet(&at(owner()), agent, contract, NOW + 30, b"multisig-approval")
        .unwrap();
    assert_eq!(
        h.registries.identity().get_agent_wallet(agent).unwrap(),
        Some(contract)
    );

    // after a transfer the contract refuses, and nothing is written
    let new_owner = Address::from_low_u64_be(0x0d);
    h.registries
        .identity_mut()
        .transfer_from(&at(owner()), owner(), new_owner, agent)
        .unwrap();
    h.drain();

    let err = h
        .registries
        .identity_mut()
        .set_agent_wallet(&at(new_owner), agent, contract, NOW + 30, b"multisig-approval")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);
    assert_eq!(h.registries.identity().get_agent_wallet(agent).unwrap(), None);
    assert!(h.drain().is_empty());
}

#[test]
fn duplicate_request_keeps_original_binding() {
    let mut h = TestHarness::new();
    let first = h.agent;
    let second = h
        .registries
        .identity_mut()
        .register(&at(owner()), "ipfs://second", &[])
        .unwrap();
    let request = H256::repeat_byte(0x44);
    let other_validator = Address::from_low_u64_be(0x5b);

    h.registries
        .validation_request(&at(owner()), validator(), first, "ipfs://a", request)
        .unwrap();
    h.registries
        .validation_request(&at(owner()), other_validator, second, "ipfs://b", request)
        .unwrap();

    let status = h.registries.validation().get_validation_status(request).unwrap();
    assert_eq!(status.validator_address, validator());
    assert_eq!(status.agent_id, first);

    let err = h
        .registries
        .validation_response(&at(other_validator), request, 10, "", H256::zero(), "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn other_agents_owner_cannot_reannounce_request() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    let own_agent = h
        .registries
        .identity_mut()
        .register(&at(stranger()), "", &[])
        .unwrap();
    let request = H256::repeat_byte(0x45);
    h.registries
        .validation_request(&at(owner()), validator(), agent, "ipfs://work", request)
        .unwrap();
    h.drain();

    let err = h
        .registries
        .validation_request(&at(stranger()), validator(), own_agent, "ipfs://forged", request)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(h.drain().is_empty());
    assert_eq!(
        h.registries.validation().get_validation_status(request).unwrap().agent_id,
        agent
    );
}

#[test]
fn anyone_may_respond_to_feedback() {
    let mut h = TestHarness::new();
    let agent = h.agent;
    h.registries
        .give_feedback(&at(client()), agent, FeedbackSubmission::new(-30, 1))
        .unwrap();

    h.registries
        .append_response(&at(owner()), agent, client(), 1, "ipfs://rebuttal", H256::repeat_byte(5))
        .unwrap();
    h.registries
        .append_response(&at(stranger()), agent, client(), 1, "ipfs://spam", H256::zero())
        .unwrap();

    let identity = h.registries.identity();
    let reputation = h.registries.reputation();
    let responses = reputation.get_responses(identity, agent, client(), 1).unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].responder, owner());
    assert_eq!(
        reputation
            .get_response_count(identity, agent, None, 0, &[owner()])
            .unwrap(),
        1
    );
}
