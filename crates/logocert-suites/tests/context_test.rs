//! Shared run state held by the suite context

mod common;

use common::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tempfile::TempDir;

#[test]
fn test_registration_state_survives_panicking_update() {
    let temp_dir = TempDir::new().unwrap();
    let harness = Harness::new(
        FakePortal::default(),
        FakeDevice::default(),
        FakeDiscovery::advertising(vec![]),
        vec![],
    );
    let ctx = harness.context(fast_config(temp_dir.path()));

    let result = catch_unwind(AssertUnwindSafe(|| {
        ctx.update_registration(|state| {
            state.claim_token = Some("claim-abc".to_string());
            panic!("case failed mid-update");
        })
    }));
    assert!(result.is_err());

    assert_eq!(ctx.registration().claim_token.as_deref(), Some("claim-abc"));
    ctx.update_registration(|state| state.device_id = Some("device-42".to_string()));
    let state = ctx.registration();
    assert_eq!(state.claim_token.as_deref(), Some("claim-abc"));
    assert_eq!(state.device_id.as_deref(), Some("device-42"));
}
