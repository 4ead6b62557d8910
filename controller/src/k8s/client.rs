use std::collections::BTreeMap;

use coingro_common::{
    response::{print_error, print_warning},
    retry::{DEFAULT_BACKOFF, DEFAULT_RETRIES, retry},
};
use coingro_types::BotConfig;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::{
    Api,
    api::{DeleteParams, ListParams, PostParams},
};
use owo_colors::OwoColorize;

use crate::{config::Config, error::Error, k8s::Resources};

/// Typed facade over the Kubernetes API, scoped to a single namespace.
/// Individual calls are retried with bounded backoff; the composed
/// instance-level operations swallow failures so one broken bot cannot stall
/// a reconcile pass over the others.
#[derive(Clone)]
pub struct ClusterClient {
    client: kube::Client,
    resources: Resources,
}

pub fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

impl ClusterClient {
    /// Builds the facade with in-cluster credentials (falls back to the
    /// local kubeconfig outside the cluster).
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let client = kube::Client::try_default()
            .await
            .map_err(|e| Error::operational(format!("Could not create kubernetes client: {}", e)))?;
        Ok(Self {
            client,
            resources: Resources::new(config),
        })
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), self.resources.namespace())
    }

    fn services(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), self.resources.namespace())
    }

    fn pvcs(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), self.resources.namespace())
    }

    pub async fn get_pod(&self, name: &str) -> Option<Pod> {
        match self.pods().get(name).await {
            Ok(pod) => Some(pod),
            Err(e) if is_not_found(&e) => None,
            Err(e) => {
                print_warning(anyhow::anyhow!("Kubernetes client error: {}", e));
                None
            }
        }
    }

    pub async fn list_pods(&self) -> Result<Vec<Pod>, Error> {
        let list = retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            self.pods().list(&ListParams::default()).await
        })
        .await
        .map_err(|e| Error::transient(format!("error {} listing pods", e)))?;
        Ok(list.items)
    }

    pub async fn get_service(&self, name: &str) -> Option<Service> {
        match self.services().get(name).await {
            Ok(service) => Some(service),
            Err(e) if is_not_found(&e) => None,
            Err(e) => {
                print_warning(anyhow::anyhow!("Kubernetes client error: {}", e));
                None
            }
        }
    }

    /// Idempotent: an existing service by the same name is reused.
    async fn create_service(&self, bot_id: &str) -> Result<Service, Error> {
        let service = self.resources.service(bot_id);
        let service = &service;
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            if let Some(service) = self.get_service(bot_id).await {
                return Ok(service);
            }
            self.services()
                .create(&PostParams::default(), service)
                .await
        })
        .await
        .map_err(|e| Error::transient(format!("error {} creating service", e)))
    }

    /// A stale pod by the same name is deleted before the new one is created.
    async fn create_pod(
        &self,
        bot_id: &str,
        bot_config: &BotConfig,
        env: &BTreeMap<String, String>,
    ) -> Result<Pod, Error> {
        let pod = self.resources.pod(bot_id, bot_config, env)?;
        let pod = &pod;
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            if self.get_pod(bot_id).await.is_some() {
                self.delete_pod(bot_id).await?;
            }
            self.pods()
                .create(&PostParams::default(), pod)
                .await
                .map_err(Error::from)
        })
        .await
        .map_err(|e| Error::transient(format!("error {} creating pod", e)))
    }

    async fn replace_pod(
        &self,
        bot_id: &str,
        bot_config: &BotConfig,
        env: &BTreeMap<String, String>,
    ) -> Result<Pod, Error> {
        let pod = self.resources.pod(bot_id, bot_config, env)?;
        let pod = &pod;
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            self.pods()
                .replace(bot_id, &PostParams::default(), pod)
                .await
        })
        .await
        .map_err(|e| Error::transient(format!("error {} replacing pod", e)))
    }

    pub async fn delete_pod(&self, name: &str) -> Result<(), Error> {
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            match self.pods().delete(name, &DeleteParams::default()).await {
                Ok(_) => Ok(()),
                Err(e) if is_not_found(&e) => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| Error::transient(format!("error {} deleting pod", e)))
    }

    pub async fn delete_service(&self, name: &str) -> Result<(), Error> {
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            match self.services().delete(name, &DeleteParams::default()).await {
                Ok(_) => Ok(()),
                Err(e) if is_not_found(&e) => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| Error::transient(format!("error {} deleting service", e)))
    }

    pub async fn delete_pvc(&self, name: &str) -> Result<(), Error> {
        retry(DEFAULT_RETRIES, DEFAULT_BACKOFF, move || async move {
            match self.pvcs().delete(name, &DeleteParams::default()).await {
                Ok(_) => Ok(()),
                Err(e) if is_not_found(&e) => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| Error::transient(format!("error {} deleting persistent volume claim", e)))
    }

    pub async fn create_bot_instance(
        &self,
        bot_id: &str,
        bot_config: &BotConfig,
        env: &BTreeMap<String, String>,
    ) -> Option<Pod> {
        let result: Result<Pod, Error> = async {
            self.create_service(bot_id).await?;
            self.create_pod(bot_id, bot_config, env).await
        }
        .await;
        match result {
            Ok(pod) => Some(pod),
            Err(e) => {
                print_error(anyhow::anyhow!(
                    "Could not create coingro instance {} due to: {}",
                    bot_id,
                    e
                ));
                None
            }
        }
    }

    pub async fn replace_bot_instance(
        &self,
        bot_id: &str,
        bot_config: &BotConfig,
        env: &BTreeMap<String, String>,
    ) -> Option<Pod> {
        match self.replace_pod(bot_id, bot_config, env).await {
            Ok(pod) => Some(pod),
            Err(e) => {
                print_error(anyhow::anyhow!(
                    "Could not replace coingro instance {} due to: {}",
                    bot_id,
                    e
                ));
                None
            }
        }
    }

    pub async fn delete_bot_instance(&self, bot_id: &str) {
        let result: Result<(), Error> = async {
            self.delete_pod(bot_id).await?;
            self.delete_service(bot_id).await
        }
        .await;
        if let Err(e) = result {
            print_error(anyhow::anyhow!(
                "Could not delete coingro instance {} due to: {}",
                bot_id,
                e
            ));
        } else {
            println!(
                "{}{}",
                "🗑️ Deleted coingro instance • ".green(),
                bot_id.green().dimmed()
            );
        }
    }
}
