/*!
 * Tests for credential masking, rotation and the retry state machine
 */

use std::time::Duration;
use subrelay::credentials::{CredentialRotator, RetryState, RetryStep, backoff_delay, mask_credential};

use crate::common::LONG_KEY;

#[test]
fn test_mask_credential_withLongKey_shouldHideMiddle() {
    let masked = mask_credential(LONG_KEY);
    assert_eq!(masked, "AIzaSyAB****7890");
    assert!(!masked.contains("CDEF1234"));
}

#[test]
fn test_mask_credential_withTinyKey_shouldRevealNothing() {
    assert_eq!(mask_credential("abc"), "****");
}

#[test]
fn test_rotation_withThreeKeys_shouldBackOffOncePerRound() {
    let keys: Vec<String> = ["a", "b", "c"].iter().map(|k| k.to_string()).collect();
    let rotator = CredentialRotator::new(keys, 2).unwrap();
    let mut state = RetryState::new();

    let mut used = Vec::new();
    let mut backoffs = 0;
    while state.can_retry(3) {
        used.push(rotator.select(state.attempt()).to_string());
        if let RetryStep::Backoff { .. } = state.credential_failed(&rotator) {
            backoffs += 1;
        }
    }

    // six attempts per round, three rounds
    assert_eq!(used.len(), 18);
    assert_eq!(backoffs, 3);
    assert_eq!(&used[..6], &["a", "b", "c", "a", "b", "c"]);
}

#[test]
fn test_rotation_withSinglePass_shouldSpendRoundAfterEachKey() {
    let keys = vec!["x".to_string(), "y".to_string()];
    let rotator = CredentialRotator::new(keys, 1).unwrap();
    let mut state = RetryState::new();

    assert_eq!(state.credential_failed(&rotator), RetryStep::RotateCredential);
    assert_eq!(state.credential_failed(&rotator), RetryStep::Backoff { round: 1 });
}

#[test]
fn test_backoff_delay_withDefaultBase_shouldDoubleEachRound() {
    let base = Duration::from_millis(2000);
    let delays: Vec<u64> = (1..=4).map(|r| backoff_delay(base, r).as_secs()).collect();
    assert_eq!(delays, vec![4, 8, 16, 32]);
}
