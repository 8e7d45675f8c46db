//! # Finalizer Processing Tests
//!
//! Ordering, persistence and failure behaviour of `FinalizerProcessor`.

mod common;

use common::{
    claim, deleting, deleting_at, instance, reconciler, FakeClient, RecordingCleanup,
    RecordingProvisioner,
};
use splunk_operator::constants::FINALIZER_DELETE_PVC;
use splunk_operator::controller::reconciler::StorageClaimCleanup;
use splunk_operator::prelude::*;
use splunk_operator::runtime::error_policy::handle_reconciliation_error;
use std::sync::{Arc, Mutex};

fn processor(client: &Arc<FakeClient>, registry: FinalizerRegistry) -> FinalizerProcessor {
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(client);
    FinalizerProcessor::new(resources, registry)
}

fn recording_registry(
    client: &Arc<FakeClient>,
    tokens: &[&'static str],
) -> (FinalizerRegistry, Arc<Mutex<Vec<&'static str>>>) {
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(client);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = FinalizerRegistry::with_defaults(resources);
    for &token in tokens {
        registry = registry.register(
            token,
            Arc::new(RecordingCleanup {
                token,
                log: Arc::clone(&log),
            }),
        );
    }
    (registry, log)
}

#[tokio::test]
async fn test_two_finalizers_are_discharged_in_order() {
    let client = FakeClient::new();
    let se = deleting("ns", "foo", &["f1", "f2"]);
    client.insert(se.clone());
    let (registry, log) = recording_registry(&client, &["f1", "f2"]);

    let done = processor(&client, registry)
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap();

    assert!(done);
    assert_eq!(*log.lock().unwrap(), vec!["f1", "f2"]);
    // One persisted removal per token
    assert_eq!(client.updates.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert!(client.stored(&ObjectKey::new("ns", "foo")).is_none());
}

#[tokio::test]
async fn test_storage_and_custom_finalizers_leave_no_claims() {
    let client = FakeClient::new();
    let se = deleting("ns", "foo", &[FINALIZER_DELETE_PVC, "f2"]);
    client.insert(se.clone());
    client.insert_claim(claim("ns", "pvc-etc-splunk-foo-0", "foo"));
    client.insert_claim(claim("ns", "pvc-var-splunk-foo-0", "foo"));
    let (registry, log) = recording_registry(&client, &["f2"]);

    let done = processor(&client, registry)
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap();

    assert!(done);
    assert!(client.claim_names().is_empty());
    assert_eq!(*log.lock().unwrap(), vec!["f2"]);
}

#[tokio::test]
async fn test_unrecognized_finalizer_names_token_and_keeps_later_ones() {
    let client = FakeClient::new();
    let key = ObjectKey::new("ns", "foo");
    let se = deleting("ns", "foo", &[FINALIZER_DELETE_PVC, "bogus", "later"]);
    client.insert(se.clone());
    client.insert_claim(claim("ns", "foo-pvc", "foo"));
    let (registry, log) = recording_registry(&client, &["later"]);

    let err = processor(&client, registry)
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap_err();

    match &err {
        FinalizerError::Unrecognized { key: k, token } => {
            assert_eq!(k, &key);
            assert_eq!(token, "bogus");
        }
        other => panic!("expected unrecognized finalizer, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "finalizer in SplunkEnterprise ns/foo not recognized: bogus"
    );
    // Earlier removal stays persisted, the rest is untouched
    assert_eq!(
        client.stored_finalizers(&key).unwrap(),
        vec!["bogus", "later"]
    );
    assert!(client.claim_names().is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_leading_unrecognized_finalizer_blocks_all_cleanup() {
    let client = FakeClient::new();
    let key = ObjectKey::new("ns", "foo");
    let se = deleting("ns", "foo", &["bogus", FINALIZER_DELETE_PVC]);
    client.insert(se.clone());
    client.insert_claim(claim("ns", "foo-pvc", "foo"));
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);

    let result = processor(&client, FinalizerRegistry::with_defaults(resources))
        .process_deletion(se, &CallContext::default())
        .await;

    assert!(matches!(result, Err(FinalizerError::Unrecognized { .. })));
    assert_eq!(client.claim_names(), vec!["foo-pvc"]);
    assert_eq!(
        client.stored_finalizers(&key).unwrap(),
        vec!["bogus", FINALIZER_DELETE_PVC]
    );
    assert_eq!(client.writes(), 0);
}

#[tokio::test]
async fn test_cleanup_failure_keeps_finalizer() {
    let client = FakeClient::new();
    let key = ObjectKey::new("ns", "foo");
    let se = deleting("ns", "foo", &[FINALIZER_DELETE_PVC]);
    client.insert(se.clone());
    client.insert_claim(claim("ns", "foo-pvc", "foo"));
    client.fail("delete_claim");
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);

    let err = processor(&client, FinalizerRegistry::with_defaults(resources))
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FinalizerError::Cleanup { .. }));
    assert!(err.is_retryable());
    assert_eq!(
        client.stored_finalizers(&key).unwrap(),
        vec![FINALIZER_DELETE_PVC]
    );
}

#[tokio::test]
async fn test_list_failure_aborts_cleanup() {
    let client = FakeClient::new();
    let se = deleting("ns", "foo", &[FINALIZER_DELETE_PVC]);
    client.insert(se.clone());
    client.fail("list_claims");
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);

    let result = processor(&client, FinalizerRegistry::with_defaults(resources))
        .process_deletion(se, &CallContext::default())
        .await;

    assert!(matches!(result, Err(FinalizerError::Cleanup { .. })));
    assert_eq!(client.writes(), 0);
}

#[tokio::test]
async fn test_stale_resource_version_is_a_persist_error() {
    let client = FakeClient::new();
    let key = ObjectKey::new("ns", "foo");
    let stale = deleting("ns", "foo", &[FINALIZER_DELETE_PVC]);
    let mut current = stale.clone();
    current.metadata.resource_version = Some("2".to_string());
    client.insert(current);
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);

    let err = processor(&client, FinalizerRegistry::with_defaults(resources))
        .process_deletion(stale, &CallContext::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FinalizerError::Persist {
            source: ClientError::Conflict,
            ..
        }
    ));
    assert_eq!(
        client.stored_finalizers(&key).unwrap(),
        vec![FINALIZER_DELETE_PVC]
    );
}

#[tokio::test]
async fn test_duplicate_tokens_are_discharged_once() {
    let client = FakeClient::new();
    let se = deleting("ns", "foo", &["f1", "f1"]);
    client.insert(se.clone());
    let (registry, log) = recording_registry(&client, &["f1"]);

    let done = processor(&client, registry)
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap();

    assert!(done);
    assert_eq!(*log.lock().unwrap(), vec!["f1"]);
    assert!(client.stored(&ObjectKey::new("ns", "foo")).is_none());
}

#[tokio::test]
async fn test_future_deletion_timestamp_still_processed() {
    let client = FakeClient::new();
    let se = deleting_at("ns", "foo", &[FINALIZER_DELETE_PVC], "2999-01-01T00:00:00Z");
    client.insert(se.clone());
    client.insert_claim(claim("ns", "foo-pvc", "foo"));
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);

    let done = processor(&client, FinalizerRegistry::with_defaults(resources))
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap();

    assert!(done);
    assert!(client.claim_names().is_empty());
}

#[tokio::test]
async fn test_empty_finalizer_list_reports_nothing_done() {
    let client = FakeClient::new();
    let se = deleting("ns", "foo", &[]);
    client.insert(se.clone());
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);

    let done = processor(&client, FinalizerRegistry::with_defaults(resources))
        .process_deletion(se, &CallContext::default())
        .await
        .unwrap();

    assert!(!done);
    assert_eq!(client.writes(), 0);
}

#[tokio::test]
async fn test_storage_cleanup_is_idempotent() {
    let client = FakeClient::new();
    let se = instance("ns", "foo", &[]);
    client.insert_claim(claim("ns", "foo-pvc", "foo"));
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(&client);
    let cleanup = StorageClaimCleanup::new(resources);
    let calls = CallContext::default();

    cleanup.cleanup(&se, &calls).await.unwrap();
    cleanup.cleanup(&se, &calls).await.unwrap();

    assert!(client.claim_names().is_empty());
    assert_eq!(
        client.claim_deletes.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_error_policy_waits_for_change_on_unknown_finalizer() {
    let client = FakeClient::new();
    let se = deleting("ns", "foo", &["bogus"]);
    client.insert(se.clone());
    let provisioner = Arc::new(RecordingProvisioner::default());
    let ctx = Arc::new(reconciler(&client, &provisioner));

    let err = ctx
        .reconcile(&ObjectKey::new("ns", "foo"))
        .await
        .unwrap_err();
    let action = handle_reconciliation_error(Arc::new(se), &err, Arc::clone(&ctx));

    assert_eq!(action, kube_runtime::controller::Action::await_change());
}
