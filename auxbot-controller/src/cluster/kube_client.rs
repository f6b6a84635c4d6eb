//! Kubernetes core/v1 client over `reqwest`.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use auxbot_common::Error;

use crate::cluster::models::{ApiStatus, ObjectList, Pod, Service};
use crate::cluster::ClusterApi;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Clone)]
pub struct KubeClient {
    http: Client,
    base_url: String,
    namespace: String,
    token: Option<String>,
}

impl KubeClient {
    /// `base_url` is the API server root, e.g. `https://10.0.0.1:443`.
    pub fn new(http: Client, base_url: impl Into<String>, namespace: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
            token,
        }
    }

    /// Configure from the pod's service account, the way every in-cluster
    /// client does.
    pub fn in_cluster(namespace: impl Into<String>) -> Result<Self, Error> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| Error::Config("KUBERNETES_SERVICE_HOST is not set; not running in a cluster?".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());

        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token = std::fs::read_to_string(dir.join("token"))?.trim().to_string();
        let ca = std::fs::read(dir.join("ca.crt"))?;

        let http = Client::builder()
            .add_root_certificate(Certificate::from_pem(&ca)?)
            .build()?;

        // IPv6 hosts need brackets in a URL.
        let host = if host.contains(':') { format!("[{host}]") } else { host };
        Ok(Self::new(http, format!("https://{host}:{port}"), namespace, Some(token)))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn collection_url(&self, resource: &str) -> String {
        format!("{}/api/v1/namespaces/{}/{}", self.base_url, self.namespace, resource)
    }

    fn object_url(&self, resource: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(resource), name)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(resp: Response) -> Result<Response, Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiStatus>(&body)
            .ok()
            .and_then(|s| s.message.or(s.reason))
            .unwrap_or(body);
        Err(Error::Cluster {
            status: status.as_u16(),
            message,
        })
    }

    async fn create<T>(&self, resource: &str, body: &T) -> Result<T, Error>
    where
        T: serde::Serialize + DeserializeOwned,
    {
        let req = self.authorize(self.http.post(self.collection_url(resource)).json(body));
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn list<T: DeserializeOwned>(&self, resource: &str, label_selector: &str) -> Result<Vec<T>, Error> {
        let req = self.authorize(
            self.http
                .get(self.collection_url(resource))
                .query(&[("labelSelector", label_selector)]),
        );
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json::<ObjectList<T>>().await?.items)
    }

    async fn delete(&self, resource: &str, name: &str) -> Result<(), Error> {
        let req = self.authorize(self.http.delete(self.object_url(resource, name)));
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("{} {} already deleted", resource, name);
            return Ok(());
        }
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn create_pod(&self, pod: &Pod) -> Result<Pod, Error> {
        self.create("pods", pod).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service, Error> {
        self.create("services", service).await
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, Error> {
        self.list("pods", label_selector).await
    }

    async fn list_services(&self, label_selector: &str) -> Result<Vec<Service>, Error> {
        self.list("services", label_selector).await
    }

    async fn delete_pod(&self, name: &str) -> Result<(), Error> {
        self.delete("pods", name).await
    }

    async fn delete_service(&self, name: &str) -> Result<(), Error> {
        self.delete("services", name).await
    }
}
