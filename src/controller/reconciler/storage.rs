//! # Storage Claim Cleanup
//!
//! Cleanup action behind the `enterprise.splunk.com/delete-pvc` finalizer:
//! every PersistentVolumeClaim labelled for the instance is deleted before the
//! finalizer may be removed.

use crate::constants::{LABEL_APP, LABEL_APP_VALUE, LABEL_FOR};
use crate::controller::reconciler::client::{CallContext, ClientError, ResourceClient};
use crate::controller::reconciler::finalizers::CleanupAction;
use crate::controller::reconciler::types::ObjectKey;
use crate::crd::SplunkEnterprise;
use crate::observability::metrics;
use async_trait::async_trait;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Labels carried by every object created for instance `name`
#[must_use]
pub fn instance_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP.to_string(), LABEL_APP_VALUE.to_string()),
        (LABEL_FOR.to_string(), name.to_string()),
    ])
}

/// Label selector matching the storage claims of instance `name`
#[must_use]
pub fn claim_selector(name: &str) -> String {
    instance_labels(name)
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub struct StorageClaimCleanup {
    resources: Arc<dyn ResourceClient>,
}

impl std::fmt::Debug for StorageClaimCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClaimCleanup").finish_non_exhaustive()
    }
}

impl StorageClaimCleanup {
    #[must_use]
    pub fn new(resources: Arc<dyn ResourceClient>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl CleanupAction for StorageClaimCleanup {
    fn name(&self) -> &'static str {
        "storage-claims"
    }

    async fn cleanup(
        &self,
        resource: &SplunkEnterprise,
        calls: &CallContext,
    ) -> Result<(), ClientError> {
        let key = ObjectKey::for_resource(resource);
        let selector = claim_selector(&key.name);

        let claims = calls
            .run("list", self.resources.list_claims(&key.namespace, &selector))
            .await?;
        debug!("Found {} PVCs for {} ({})", claims.len(), key, selector);

        for claim in &claims {
            info!(
                "Deleting PVC for SplunkEnterprise {}: {}",
                key,
                claim.name_any()
            );
            calls
                .run("delete", self.resources.delete_claim(claim))
                .await?;
            metrics::increment_storage_claims_deleted();
        }

        Ok(())
    }
}
