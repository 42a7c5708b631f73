use chrono::{DateTime, Duration, Utc};
use keystone_consensus::{ClusterState, LicensesMetadata};
use keystone_license::{License, LicenseSpec, LicenseType};
use keystone_types::ClusterId;
use pretty_assertions::assert_eq;

fn unsigned_license(license_type: LicenseType) -> License {
    let issued = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
    License::from_parts(
        LicenseSpec {
            uid: "uid-1".to_string(),
            version: 1,
            license_type,
            issued_to: "customer".to_string(),
            issuer: "keystone".to_string(),
            issue_date: issued,
            expiry_date: issued + Duration::hours(1),
            max_nodes: 3,
        },
        vec![7u8; 64],
    )
}

// ── LicensesMetadata ─────────────────────────────────────────────

#[test]
fn default_is_absent() {
    let meta = LicensesMetadata::default();
    assert!(meta.is_absent());
    assert!(!meta.is_tombstone());
    assert!(meta.license().is_none());
}

#[test]
fn tombstone_is_not_absent() {
    let meta = LicensesMetadata::Tombstone;
    assert!(meta.is_tombstone());
    assert!(!meta.is_absent());
    assert!(meta.license().is_none());
    assert_ne!(meta, LicensesMetadata::Absent);
}

#[test]
fn licensed_exposes_license() {
    let license = unsigned_license(LicenseType::Gold);
    let meta = LicensesMetadata::Licensed(license.clone());
    assert_eq!(meta.license(), Some(&license));
}

#[test]
fn serialized_states_are_distinguishable() {
    let absent = serde_json::to_string(&LicensesMetadata::Absent).unwrap();
    let tombstone = serde_json::to_string(&LicensesMetadata::Tombstone).unwrap();
    assert_eq!(absent, r#"{"state":"absent"}"#);
    assert_eq!(tombstone, r#"{"state":"tombstone"}"#);

    let parsed: LicensesMetadata = serde_json::from_str(&tombstone).unwrap();
    assert_eq!(parsed, LicensesMetadata::Tombstone);
}

// ── ClusterState ─────────────────────────────────────────────────

#[test]
fn bootstrap_state() {
    let id = ClusterId::new();
    let state = ClusterState::bootstrap(id);
    assert_eq!(state.cluster_id, id);
    assert_eq!(state.version, 0);
    assert_eq!(state.licenses, LicensesMetadata::Absent);
}

#[test]
fn next_bumps_version_and_keeps_cluster() {
    let state = ClusterState::bootstrap(ClusterId::new());
    let next = state.next(LicensesMetadata::Tombstone);
    assert_eq!(next.version, 1);
    assert_eq!(next.cluster_id, state.cluster_id);
    assert_eq!(next.licenses, LicensesMetadata::Tombstone);
}

#[test]
fn bytes_keep_license_verbatim() {
    let license = unsigned_license(LicenseType::Platinum);
    let state = ClusterState::bootstrap(ClusterId::new()).next(LicensesMetadata::Licensed(license.clone()));
    let restored = ClusterState::from_bytes(&state.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, state);
    assert_eq!(restored.licenses.license().unwrap().signature(), license.signature());
}

#[test]
fn from_bytes_rejects_garbage() {
    assert!(ClusterState::from_bytes(b"not json").is_err());
}

#[tokio::test]
async fn file_persistence_keeps_tombstone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster-state.json");

    let state = ClusterState::bootstrap(ClusterId::new())
        .next(LicensesMetadata::Licensed(unsigned_license(LicenseType::Gold)))
        .next(LicensesMetadata::Tombstone);
    state.write_to(&path).await.unwrap();

    let restored = ClusterState::read_from(&path).await.unwrap().unwrap();
    assert_eq!(restored.version, 2);
    assert!(restored.licenses.is_tombstone());
}

#[tokio::test]
async fn read_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let restored = ClusterState::read_from(dir.path().join("missing.json")).await.unwrap();
    assert!(restored.is_none());
}
