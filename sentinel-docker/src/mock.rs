//! An in-memory [`Daemon`] used by this crate's own tests and by `sentinel-agent`'s session
//! tests, so neither has to stand up a real Docker daemon to exercise the update flow.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::{
    ContainerInfo, ContainerInspect, CreateSpec, ExecOptions, ExecResult, ImageInfo, ListScope,
    NetworkEndpoint,
};
use crate::{Daemon, Error};

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub info: ContainerInfo,
    pub inspect: ContainerInspect,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, MockContainer>,
    images: BTreeMap<String, String>,
    removed: Vec<String>,
    created: Vec<CreateSpec>,
    started: Vec<String>,
    pulls: Vec<String>,
}

/// A test double recording every call it receives, so assertions can inspect call order and
/// arguments as well as final state.
#[derive(Default)]
pub struct MockDaemon {
    state: Mutex<State>,
}

impl MockDaemon {
    pub fn new() -> Self {
        MockDaemon::default()
    }

    pub fn with_container(self, name: &str, image: &str, digest: &str) -> Self {
        let id = format!("mock-{name}");
        let info = ContainerInfo {
            id: id.clone(),
            name: name.to_string(),
            image: image.to_string(),
            state: "running".to_string(),
            labels: BTreeMap::new(),
        };
        let inspect = ContainerInspect {
            id: id.clone(),
            name: name.to_string(),
            image: image.to_string(),
            config: serde_json::json!({}),
            host_config: serde_json::json!({}),
            networks: BTreeMap::new(),
            labels: BTreeMap::new(),
        };
        let mut state = self.state.lock().unwrap();
        state.containers.insert(id.clone(), MockContainer { info, inspect });
        state.images.insert(image.to_string(), digest.to_string());
        drop(state);
        self
    }

    pub fn set_image_digest(&self, image: &str, digest: &str) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(image.to_string(), digest.to_string());
    }

    pub fn created_specs(&self) -> Vec<CreateSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.state.lock().unwrap().pulls.clone()
    }
}

#[async_trait]
impl Daemon for MockDaemon {
    async fn list_containers(&self, _scope: ListScope) -> Result<Vec<ContainerInfo>, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .values()
            .map(|c| c.info.clone())
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspect, Error> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(id)
            .map(|c| c.inspect.clone())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn create(&self, spec: &CreateSpec) -> Result<String, Error> {
        let id = format!("mock-{}-recreated", spec.name);
        let mut state = self.state.lock().unwrap();
        state.created.push(spec.clone());
        let info = ContainerInfo {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            state: "created".to_string(),
            labels: BTreeMap::new(),
        };
        let inspect = ContainerInspect {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            config: spec.config.clone(),
            host_config: spec.host_config.clone(),
            networks: spec.networks.clone(),
            labels: BTreeMap::new(),
        };
        state.containers.insert(id.clone(), MockContainer { info, inspect });
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().started.push(id.to_string());
        Ok(())
    }

    async fn stop(&self, _id: &str, _grace: Duration) -> Result<(), Error> {
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.containers.remove(id);
        state.removed.push(id.to_string());
        Ok(())
    }

    async fn restart(&self, _id: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<(), Error> {
        self.state.lock().unwrap().pulls.push(image.to_string());
        Ok(())
    }

    async fn image_digest(&self, image: &str) -> Result<String, Error> {
        self.state
            .lock()
            .unwrap()
            .images
            .get(image)
            .cloned()
            .ok_or(Error::MissingDigestLabel)
    }

    async fn distribution_digest(&self, image: &str) -> Result<String, Error> {
        self.image_digest(image).await
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .images
            .keys()
            .map(|tag| ImageInfo {
                id: format!("sha256:{tag}"),
                repo_tags: vec![tag.clone()],
                in_use: false,
            })
            .collect())
    }

    async fn prune_images(&self) -> Result<u64, Error> {
        Ok(0)
    }

    async fn remove_image(&self, id: &str) -> Result<(), Error> {
        self.state.lock().unwrap().images.remove(id);
        Ok(())
    }

    async fn tag_image(&self, _id: &str, _repo: &str, _tag: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn exec(&self, id: &str, command: &[String], _opts: ExecOptions) -> Result<ExecResult, Error> {
        if !self.state.lock().unwrap().containers.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(ExecResult {
            exit_code: 0,
            output: format!("ran: {}", command.join(" ")),
        })
    }

    async fn logs(&self, id: &str, _tail: u64) -> Result<String, Error> {
        if !self.state.lock().unwrap().containers.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recreate_flow_copies_portable_network_fields() {
        let daemon = MockDaemon::new().with_container("web", "nginx:1.25", "sha256:old");
        daemon.set_image_digest("nginx:1.26", "sha256:new");

        let endpoint = NetworkEndpoint {
            network_id: "net1".to_string(),
            aliases: vec!["web".to_string()],
            driver_opts: BTreeMap::new(),
            ipam_config: None,
            mac_address: None,
        };
        let inspect = daemon.inspect("mock-web").await.unwrap();
        let mut spec = inspect.recreate_with_image("nginx:1.26");
        spec.networks.insert("bridge".to_string(), endpoint);

        let new_id = daemon.create(&spec).await.unwrap();
        daemon.start(&new_id).await.unwrap();
        daemon.remove("mock-web").await.unwrap();

        assert_eq!(daemon.created_specs().len(), 1);
        assert_eq!(daemon.started(), vec![new_id]);
        assert_eq!(daemon.removed(), vec!["mock-web".to_string()]);
    }

    #[tokio::test]
    async fn inspect_unknown_container_is_not_found() {
        let daemon = MockDaemon::new();
        let result = daemon.inspect("missing").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
