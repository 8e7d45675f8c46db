//! # Provisioning
//!
//! Drives the cluster toward a valid `SplunkEnterpriseSpec`.
//!
//! [`StatefulSetProvisioner`] runs Splunk as a StatefulSet behind a headless
//! Service. Both are server-side applied under the operator's field manager,
//! so re-applying an unchanged spec changes nothing. Before any workload is
//! created the `delete-pvc` finalizer is put on the instance; the StatefulSet's
//! volume claim templates carry the instance labels the finalizer's cleanup
//! selects on.

use crate::constants::{FIELD_MANAGER, FINALIZER_DELETE_PVC};
use crate::controller::reconciler::client::{CallContext, ClientError};
use crate::controller::reconciler::storage::instance_labels;
use crate::controller::reconciler::types::ObjectKey;
use crate::crd::SplunkEnterprise;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

const WEB_PORT: i32 = 8000;
const MANAGEMENT_PORT: i32 = 8089;
const FORWARDER_PORT: i32 = 9997;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to add finalizer: {0}")]
    Finalizer(#[source] ClientError),
    #[error("failed to apply {kind} {name}: {source}")]
    Apply {
        kind: &'static str,
        name: String,
        source: ClientError,
    },
}

/// Brings the workload in line with a validated spec
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Must be idempotent: called on every reconciliation of an active instance.
    async fn reconcile_to_spec(
        &self,
        resource: &SplunkEnterprise,
        calls: &CallContext,
    ) -> Result<(), ProvisionError>;
}

#[derive(Clone)]
pub struct StatefulSetProvisioner {
    client: Client,
}

impl std::fmt::Debug for StatefulSetProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatefulSetProvisioner").finish_non_exhaustive()
    }
}

impl StatefulSetProvisioner {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn ensure_finalizer(
        &self,
        resource: &SplunkEnterprise,
        key: &ObjectKey,
        calls: &CallContext,
    ) -> Result<(), ProvisionError> {
        if resource.has_finalizer(FINALIZER_DELETE_PVC) {
            return Ok(());
        }

        info!("Adding finalizer {} to SplunkEnterprise {}", FINALIZER_DELETE_PVC, key);
        let mut finalizers = resource.finalizer_tokens().to_vec();
        finalizers.push(FINALIZER_DELETE_PVC.to_string());
        // resourceVersion turns the merge patch into a guarded write
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": resource.metadata.resource_version,
            }
        });

        let api: Api<SplunkEnterprise> = Api::namespaced(self.client.clone(), &key.namespace);
        calls
            .run("patch", async {
                api.patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map_err(ClientError::from)
            })
            .await
            .map_err(ProvisionError::Finalizer)?;
        Ok(())
    }

    async fn apply<K>(
        &self,
        namespace: &str,
        kind: &'static str,
        manifest: Value,
        calls: &CallContext,
    ) -> Result<(), ProvisionError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
    {
        let name = manifest["metadata"]["name"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();

        debug!("Applying {} {}/{}", kind, namespace, name);
        calls
            .run("apply", async {
                api.patch(&name, &params, &Patch::Apply(&manifest))
                    .await
                    .map_err(ClientError::from)
            })
            .await
            .map_err(|source| ProvisionError::Apply {
                kind,
                name: name.clone(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl Provisioner for StatefulSetProvisioner {
    async fn reconcile_to_spec(
        &self,
        resource: &SplunkEnterprise,
        calls: &CallContext,
    ) -> Result<(), ProvisionError> {
        let key = ObjectKey::for_resource(resource);
        self.ensure_finalizer(resource, &key, calls).await?;

        self.apply::<Service>(&key.namespace, "Service", build_service(resource), calls)
            .await?;
        self.apply::<StatefulSet>(
            &key.namespace,
            "StatefulSet",
            build_stateful_set(resource),
            calls,
        )
        .await?;

        debug!("SplunkEnterprise {} provisioned", key);
        Ok(())
    }
}

fn workload_name(name: &str) -> String {
    format!("splunk-{name}")
}

fn service_name(name: &str) -> String {
    format!("splunk-{name}-headless")
}

fn metadata(resource: &SplunkEnterprise, name: String) -> Value {
    let key = ObjectKey::for_resource(resource);
    let mut meta = json!({
        "name": name,
        "namespace": key.namespace,
        "labels": instance_labels(&key.name),
    });
    if let Some(owner) = resource.controller_owner_ref(&()) {
        meta["ownerReferences"] = json!([owner]);
    }
    meta
}

/// Headless Service giving the StatefulSet pods stable DNS names
#[must_use]
pub fn build_service(resource: &SplunkEnterprise) -> Value {
    let key = ObjectKey::for_resource(resource);
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": metadata(resource, service_name(&key.name)),
        "spec": {
            "clusterIP": "None",
            "selector": instance_labels(&key.name),
            "ports": [
                { "name": "splunkweb", "port": WEB_PORT, "protocol": "TCP" },
                { "name": "splunkd", "port": MANAGEMENT_PORT, "protocol": "TCP" },
                { "name": "s2s", "port": FORWARDER_PORT, "protocol": "TCP" },
            ],
        }
    })
}

fn claim_template(resource: &SplunkEnterprise, name: &str, size: &str) -> Value {
    let key = ObjectKey::for_resource(resource);
    let mut spec = json!({
        "accessModes": ["ReadWriteOnce"],
        "resources": { "requests": { "storage": size } },
    });
    if let Some(class) = &resource.spec.storage_class_name {
        spec["storageClassName"] = json!(class);
    }
    json!({
        "metadata": { "name": name, "labels": instance_labels(&key.name) },
        "spec": spec,
    })
}

fn container_env(resource: &SplunkEnterprise) -> Vec<Value> {
    let mut env = vec![
        json!({ "name": "SPLUNK_START_ARGS", "value": "--accept-license" }),
        json!({ "name": "SPLUNK_ROLE", "value": "splunk_standalone" }),
    ];
    if let Some(url) = &resource.spec.defaults_url {
        env.push(json!({ "name": "SPLUNK_DEFAULTS_URL", "value": url }));
    }
    if let Some(url) = &resource.spec.license_url {
        env.push(json!({ "name": "SPLUNK_LICENSE_URI", "value": url }));
    }
    env
}

/// StatefulSet running the Splunk pods with their `etc` and `var` claims
#[must_use]
pub fn build_stateful_set(resource: &SplunkEnterprise) -> Value {
    let key = ObjectKey::for_resource(resource);
    let spec = &resource.spec;
    let mut container = json!({
        "name": "splunk",
        "image": spec.image,
        "env": container_env(resource),
        "ports": [
            { "name": "splunkweb", "containerPort": WEB_PORT },
            { "name": "splunkd", "containerPort": MANAGEMENT_PORT },
            { "name": "s2s", "containerPort": FORWARDER_PORT },
        ],
        "volumeMounts": [
            { "name": "pvc-etc", "mountPath": "/opt/splunk/etc" },
            { "name": "pvc-var", "mountPath": "/opt/splunk/var" },
        ],
    });
    if let Some(policy) = spec.image_pull_policy {
        container["imagePullPolicy"] = json!(policy.as_str());
    }

    json!({
        "apiVersion": "apps/v1",
        "kind": "StatefulSet",
        "metadata": metadata(resource, workload_name(&key.name)),
        "spec": {
            "replicas": spec.replicas,
            "serviceName": service_name(&key.name),
            "podManagementPolicy": "Parallel",
            "selector": { "matchLabels": instance_labels(&key.name) },
            "template": {
                "metadata": { "labels": instance_labels(&key.name) },
                "spec": { "containers": [container] },
            },
            "volumeClaimTemplates": [
                claim_template(resource, "pvc-etc", &spec.etc_storage),
                claim_template(resource, "pvc-var", &spec.var_storage),
            ],
        }
    })
}
