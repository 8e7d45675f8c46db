//! Common test utilities
//!
//! An in-memory `ResourceClient` that behaves like the API server for the
//! calls the reconciler makes, plus fixtures built from JSON so they read like
//! the manifests they stand for.

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::ResourceExt;
use serde_json::json;
use splunk_operator::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DELETED_AT: &str = "2020-01-01T00:00:00Z";

/// SplunkEnterprise `ns/name` with the given finalizers
pub fn instance(namespace: &str, name: &str, finalizers: &[&str]) -> SplunkEnterprise {
    serde_json::from_value(json!({
        "apiVersion": "enterprise.splunk.com/v1alpha1",
        "kind": "SplunkEnterprise",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{name}"),
            "generation": 1,
            "resourceVersion": "1",
            "finalizers": finalizers,
        },
        "spec": { "replicas": 1 }
    }))
    .unwrap()
}

/// Same as [`instance`] with deletion requested at `deleted_at`
pub fn deleting_at(
    namespace: &str,
    name: &str,
    finalizers: &[&str],
    deleted_at: &str,
) -> SplunkEnterprise {
    let mut value = serde_json::to_value(instance(namespace, name, finalizers)).unwrap();
    value["metadata"]["deletionTimestamp"] = json!(deleted_at);
    serde_json::from_value(value).unwrap()
}

pub fn deleting(namespace: &str, name: &str, finalizers: &[&str]) -> SplunkEnterprise {
    deleting_at(namespace, name, finalizers, DELETED_AT)
}

/// PersistentVolumeClaim labelled for instance `owner`
pub fn claim(namespace: &str, name: &str, owner: &str) -> PersistentVolumeClaim {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "PersistentVolumeClaim",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": { "app": "splunk", "for": owner },
        },
        "spec": {}
    }))
    .unwrap()
}

#[derive(Default)]
struct FakeState {
    instances: BTreeMap<ObjectKey, SplunkEnterprise>,
    claims: Vec<PersistentVolumeClaim>,
    failing: HashSet<&'static str>,
}

/// In-memory API server
///
/// `update` enforces optimistic concurrency on resourceVersion, and an object
/// whose deletion was requested disappears once its last finalizer is removed.
#[derive(Default)]
pub struct FakeClient {
    state: Mutex<FakeState>,
    pub gets: AtomicUsize,
    pub updates: AtomicUsize,
    pub status_writes: AtomicUsize,
    pub claim_deletes: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, resource: SplunkEnterprise) {
        let key = ObjectKey::for_resource(&resource);
        self.state.lock().unwrap().instances.insert(key, resource);
    }

    pub fn insert_claim(&self, claim: PersistentVolumeClaim) {
        self.state.lock().unwrap().claims.push(claim);
    }

    /// Make every call of `operation` fail with a conflict
    pub fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn stored(&self, key: &ObjectKey) -> Option<SplunkEnterprise> {
        self.state.lock().unwrap().instances.get(key).cloned()
    }

    pub fn stored_finalizers(&self, key: &ObjectKey) -> Option<Vec<String>> {
        self.stored(key).map(|se| se.finalizer_tokens().to_vec())
    }

    pub fn claim_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .claims
            .iter()
            .map(ResourceExt::name_any)
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.updates.load(Ordering::SeqCst) + self.status_writes.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.state.lock().unwrap().failing.contains(operation) {
            return Err(ClientError::Conflict);
        }
        Ok(())
    }
}

fn bump(resource: &mut SplunkEnterprise) {
    let next = resource
        .metadata
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    resource.metadata.resource_version = Some(next.to_string());
}

fn matches_selector(claim: &PersistentVolumeClaim, selector: &str) -> bool {
    let labels = claim.labels();
    selector.split(',').all(|term| match term.split_once('=') {
        Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
        None => false,
    })
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn get(&self, key: &ObjectKey) -> Result<SplunkEnterprise, ClientError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check("get")?;
        self.stored(key).ok_or(ClientError::NotFound)
    }

    async fn update(&self, resource: &SplunkEnterprise) -> Result<SplunkEnterprise, ClientError> {
        self.check("update")?;
        let key = ObjectKey::for_resource(resource);
        let mut state = self.state.lock().unwrap();
        let stored = state.instances.get(&key).ok_or(ClientError::NotFound)?;
        if stored.metadata.resource_version != resource.metadata.resource_version {
            return Err(ClientError::Conflict);
        }

        let mut updated = resource.clone();
        updated.status = stored.status.clone();
        bump(&mut updated);
        self.updates.fetch_add(1, Ordering::SeqCst);

        if updated.is_deleting() && updated.finalizer_tokens().is_empty() {
            state.instances.remove(&key);
        } else {
            state.instances.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(
        &self,
        resource: &SplunkEnterprise,
        status: &SplunkEnterpriseStatus,
    ) -> Result<(), ClientError> {
        self.check("update_status")?;
        let key = ObjectKey::for_resource(resource);
        let mut state = self.state.lock().unwrap();
        let stored = state.instances.get_mut(&key).ok_or(ClientError::NotFound)?;
        stored.status = Some(status.clone());
        bump(stored);
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_claims(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, ClientError> {
        self.check("list_claims")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .claims
            .iter()
            .filter(|c| c.namespace().as_deref() == Some(namespace))
            .filter(|c| matches_selector(c, label_selector))
            .cloned()
            .collect())
    }

    async fn delete_claim(&self, claim: &PersistentVolumeClaim) -> Result<(), ClientError> {
        self.check("delete_claim")?;
        let mut state = self.state.lock().unwrap();
        state
            .claims
            .retain(|c| !(c.namespace() == claim.namespace() && c.name_any() == claim.name_any()));
        self.claim_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provisioner recording the replica counts it was asked for
#[derive(Default)]
pub struct RecordingProvisioner {
    pub calls: AtomicUsize,
    pub replicas: Mutex<Vec<i32>>,
    pub fail: bool,
}

impl RecordingProvisioner {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for RecordingProvisioner {
    async fn reconcile_to_spec(
        &self,
        resource: &SplunkEnterprise,
        _calls: &CallContext,
    ) -> Result<(), ProvisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replicas.lock().unwrap().push(resource.spec.replicas);
        if self.fail {
            return Err(ProvisionError::Finalizer(ClientError::Conflict));
        }
        Ok(())
    }
}

/// Cleanup action appending its token to a shared log
pub struct RecordingCleanup {
    pub token: &'static str,
    pub log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl CleanupAction for RecordingCleanup {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn cleanup(
        &self,
        _resource: &SplunkEnterprise,
        _calls: &CallContext,
    ) -> Result<(), ClientError> {
        self.log.lock().unwrap().push(self.token);
        Ok(())
    }
}

pub fn reconciler(client: &Arc<FakeClient>, provisioner: &Arc<RecordingProvisioner>) -> Reconciler {
    let resources: Arc<dyn ResourceClient> = Arc::<FakeClient>::clone(client);
    let provisioner: Arc<dyn Provisioner> = Arc::<RecordingProvisioner>::clone(provisioner);
    Reconciler::new(
        resources,
        Arc::new(SpecValidator),
        provisioner,
        CallContext::default(),
    )
}
