//! # Resource Client
//!
//! The reconciler's only path to cluster state. `KubeResourceClient` talks to a
//! real API server; tests substitute an in-memory implementation.
//!
//! Every call the reconciler makes goes through [`CallContext::run`], which
//! aborts the call when the operator shuts down or the per-call timeout fires.

use crate::constants::DEFAULT_CLIENT_CALL_TIMEOUT_SECS;
use crate::controller::reconciler::types::ObjectKey;
use crate::crd::{SplunkEnterprise, SplunkEnterpriseStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("object not found")]
    NotFound,
    #[error("object was modified concurrently (conflict)")]
    Conflict,
    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
}

impl ClientError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}

impl From<kube::Error> for ClientError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ref api_err) if api_err.code == 404 => ClientError::NotFound,
            kube::Error::Api(ref api_err) if api_err.code == 409 => ClientError::Conflict,
            other => ClientError::Kube(other),
        }
    }
}

/// Operations the reconciler needs from the control plane
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch the current object; a missing object is `ClientError::NotFound`
    async fn get(&self, key: &ObjectKey) -> Result<SplunkEnterprise, ClientError>;

    /// Replace the object, failing with `ClientError::Conflict` if its
    /// resourceVersion is stale. Returns the stored object.
    async fn update(&self, resource: &SplunkEnterprise) -> Result<SplunkEnterprise, ClientError>;

    /// Write the status subresource
    async fn update_status(
        &self,
        resource: &SplunkEnterprise,
        status: &SplunkEnterpriseStatus,
    ) -> Result<(), ClientError>;

    /// List PersistentVolumeClaims in `namespace` matching a label selector
    async fn list_claims(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, ClientError>;

    /// Delete a PersistentVolumeClaim; deleting an already-gone claim succeeds
    async fn delete_claim(&self, claim: &PersistentVolumeClaim) -> Result<(), ClientError>;
}

/// `ResourceClient` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl std::fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient").finish_non_exhaustive()
    }
}

impl KubeResourceClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn instances(&self, namespace: &str) -> Api<SplunkEnterprise> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get(&self, key: &ObjectKey) -> Result<SplunkEnterprise, ClientError> {
        self.instances(&key.namespace)
            .get_opt(&key.name)
            .await?
            .ok_or(ClientError::NotFound)
    }

    async fn update(&self, resource: &SplunkEnterprise) -> Result<SplunkEnterprise, ClientError> {
        let key = ObjectKey::for_resource(resource);
        let stored = self
            .instances(&key.namespace)
            .replace(&key.name, &PostParams::default(), resource)
            .await?;
        Ok(stored)
    }

    async fn update_status(
        &self,
        resource: &SplunkEnterprise,
        status: &SplunkEnterpriseStatus,
    ) -> Result<(), ClientError> {
        let key = ObjectKey::for_resource(resource);
        let patch = serde_json::json!({ "status": status });
        self.instances(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn list_claims(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PersistentVolumeClaim>, ClientError> {
        let list = self
            .claims(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn delete_claim(&self, claim: &PersistentVolumeClaim) -> Result<(), ClientError> {
        let namespace = claim.namespace().unwrap_or_else(|| "default".to_string());
        match self
            .claims(&namespace)
            .delete(&claim.name_any(), &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match ClientError::from(e) {
                ClientError::NotFound => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Cancellation and timeout applied to every blocking call of a reconciliation
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    timeout: Duration,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new(
            CancellationToken::new(),
            Duration::from_secs(DEFAULT_CLIENT_CALL_TIMEOUT_SECS),
        )
    }
}

impl CallContext {
    #[must_use]
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    /// Token whose cancellation aborts in-flight calls
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one client call, aborting it on cancellation or timeout
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled { operation });
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ClientError::Cancelled { operation }),
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(result) => result,
                Err(_elapsed) => Err(ClientError::Timeout {
                    operation,
                    timeout: self.timeout,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_passes_through_result() {
        let calls = CallContext::default();
        let value = calls.run("get", async { Ok::<_, ClientError>(7) }).await;
        assert_eq!(value.unwrap(), 7);

        let err = calls
            .run("get", async { Err::<(), _>(ClientError::NotFound) })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_run_refuses_after_cancellation() {
        let token = CancellationToken::new();
        let calls = CallContext::new(token.clone(), Duration::from_secs(5));
        token.cancel();

        let err = calls
            .run("update", async { Ok::<_, ClientError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { operation: "update" }));
    }

    #[tokio::test]
    async fn test_run_aborts_in_flight_call_on_cancellation() {
        let token = CancellationToken::new();
        let calls = CallContext::new(token.clone(), Duration::from_secs(60));

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel();
            })
        };

        let err = calls
            .run("list", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, ClientError>(())
            })
            .await
            .unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, ClientError::Cancelled { operation: "list" }));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let calls = CallContext::new(CancellationToken::new(), Duration::from_millis(10));
        let err = calls
            .run("delete", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ClientError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { operation: "delete", .. }));
        assert!(err.to_string().contains("delete timed out"));
    }
}
