//! Shared test helpers for license service tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use keystone_consensus::{
    ClusterConfig, ClusterState, CommitAck, ConsensusBoundary, ConsensusError, ConsensusResult,
    InMemoryCluster, LicensesMetadata, Mutation,
};
use keystone_license::{License, LicenseSpec, LicenseType, LicenseVerifier, TrustedKeys};
use keystone_service::{LicenseService, ServiceConfig};
use keystone_types::{Clock, ClusterId, ManualClock, NodeId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, [u8; 32]) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key.to_bytes())
}

/// A verifier trusting the test key for format version 1.
pub fn test_verifier() -> LicenseVerifier {
    let (_, pk) = test_keypair();
    LicenseVerifier::new(TrustedKeys::new().with_key(1, &pk).unwrap())
}

/// Current time truncated to the millisecond precision licenses carry.
pub fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

/// Signs a license of the given type, valid from `issued` for `lifetime`.
pub fn signed_license_at(
    license_type: LicenseType,
    issued: DateTime<Utc>,
    lifetime: Duration,
) -> License {
    let (sk, _) = test_keypair();
    let spec = LicenseSpec {
        uid: format!("{}-{}-{}", license_type, issued.timestamp_millis(), lifetime.num_milliseconds()),
        version: 1,
        license_type,
        issued_to: "customer".to_string(),
        issuer: "keystone".to_string(),
        issue_date: issued,
        expiry_date: issued + lifetime,
        max_nodes: 5,
    };
    let signature = sk.sign(&spec.canonical_bytes().unwrap());
    License::from_parts(spec, signature.to_bytes().to_vec())
}

/// Returns a copy of `license` with the expiry pushed out, keeping the
/// original signature.
pub fn tamper_expiry(license: &License, by: Duration) -> License {
    let mut spec = license.spec().clone();
    spec.expiry_date += by;
    License::from_parts(spec, license.signature().to_vec())
}

/// A three-node cluster plus a license service attached to every node,
/// all sharing one manual clock.
pub struct Harness {
    pub cluster: InMemoryCluster,
    pub clock: ManualClock,
    pub services: Vec<LicenseService>,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(ClusterConfig::default(), ServiceConfig::default())
    }

    pub fn with_config(cluster_config: ClusterConfig, service_config: ServiceConfig) -> Self {
        let cluster = InMemoryCluster::start(cluster_config);
        let clock = ManualClock::new(now_millis());
        let services = cluster
            .nodes()
            .iter()
            .map(|node| {
                LicenseService::with_clock(
                    Arc::new(node.clone()),
                    test_verifier(),
                    Arc::new(clock.clone()),
                    service_config.clone(),
                )
                .unwrap()
            })
            .collect();
        Self {
            cluster,
            clock,
            services,
        }
    }

    /// The service on the first (leader) node.
    pub fn leader(&self) -> &LicenseService {
        &self.services[0]
    }

    /// The harness clock's current instant.
    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A license issued at the harness clock's current instant.
    pub fn license(&self, license_type: LicenseType, lifetime: Duration) -> License {
        signed_license_at(license_type, self.clock_now(), lifetime)
    }
}

/// Boundary that applies mutations synchronously and counts proposals.
pub struct FakeConsensus {
    node_id: NodeId,
    state: Mutex<Arc<ClusterState>>,
    proposals: AtomicUsize,
    fail: AtomicBool,
}

impl FakeConsensus {
    pub fn new() -> Self {
        Self {
            node_id: NodeId::new(),
            state: Mutex::new(Arc::new(ClusterState::bootstrap(ClusterId::new()))),
            proposals: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn proposals(&self) -> usize {
        self.proposals.load(Ordering::SeqCst)
    }

    /// Makes every following proposal fail with `NoLeader`.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsensusBoundary for FakeConsensus {
    fn local_node(&self) -> NodeId {
        self.node_id
    }

    fn read(&self) -> Arc<ClusterState> {
        self.state.lock().unwrap().clone()
    }

    fn is_leader(&self) -> bool {
        true
    }

    async fn propose(
        &self,
        _source: &str,
        mutation: Mutation,
        _timeout: std::time::Duration,
    ) -> ConsensusResult<CommitAck> {
        self.proposals.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConsensusError::NoLeader);
        }
        let mut state = self.state.lock().unwrap();
        let licenses: LicensesMetadata = mutation(&state.licenses);
        if licenses == state.licenses {
            return Ok(CommitAck {
                version: state.version,
                changed: false,
            });
        }
        *state = Arc::new(state.next(licenses));
        Ok(CommitAck {
            version: state.version,
            changed: true,
        })
    }
}
