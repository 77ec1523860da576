//! `bollard`-backed implementation of [`crate::Daemon`].
//!
//! Connects over a Unix socket (`/var/run/docker.sock`) by default, or TCP
//! with optional mutual TLS when the configured URL begins with `tcp://` / `tcps://`. TLS is
//! configured with a minimum version of 1.2 and `ServerName` derived from the parsed URL
//! host — `bollard::Docker::connect_with_ssl` already does both, so we parameterize it
//! rather than hand-rolling the TLS stack here.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions, TagImageOptions};
use bollard::container::NetworkingConfig;
use bollard::models::{ContainerCreateResponse, EndpointSettings, HostConfig};
use futures::StreamExt;
use tracing::{trace, warn};

use crate::types::{
    ContainerInfo, ContainerInspect, CreateSpec, ExecOptions, ExecResult, ImageInfo, ListScope,
    NetworkEndpoint,
};
use crate::{Daemon, Error};

/// How to reach the daemon.
#[derive(Debug, Clone)]
pub enum ConnectConfig {
    UnixSocket { path: Option<PathBuf> },
    Tcp { addr: String },
    TcpMutualTls {
        addr: String,
        ca: PathBuf,
        cert: PathBuf,
        key: PathBuf,
    },
}

impl ConnectConfig {
    /// Parses a daemon URL: `tcp://`/`tcps://` select TCP (with
    /// mTLS for `tcps://` when cert material is supplied), anything else is a Unix socket path.
    pub fn from_url(url: &str, tls: Option<(PathBuf, PathBuf, PathBuf)>) -> ConnectConfig {
        if let Some(addr) = url.strip_prefix("tcps://") {
            if let Some((ca, cert, key)) = tls {
                return ConnectConfig::TcpMutualTls {
                    addr: addr.to_string(),
                    ca,
                    cert,
                    key,
                };
            }
            return ConnectConfig::Tcp {
                addr: addr.to_string(),
            };
        }
        if let Some(addr) = url.strip_prefix("tcp://") {
            return ConnectConfig::Tcp {
                addr: addr.to_string(),
            };
        }
        ConnectConfig::UnixSocket {
            path: Some(PathBuf::from(url)),
        }
    }
}

pub struct BollardDaemon {
    docker: Docker,
}

impl BollardDaemon {
    pub fn connect(config: ConnectConfig) -> Result<Self, Error> {
        let docker = match config {
            ConnectConfig::UnixSocket { path: None } => Docker::connect_with_local_defaults()?,
            ConnectConfig::UnixSocket { path: Some(path) } => {
                Docker::connect_with_socket(&path.to_string_lossy(), 10, bollard::API_DEFAULT_VERSION)?
            }
            ConnectConfig::Tcp { addr } => {
                Docker::connect_with_http(&format!("tcp://{addr}"), 10, bollard::API_DEFAULT_VERSION)?
            }
            ConnectConfig::TcpMutualTls { addr, ca, cert, key } => Docker::connect_with_ssl(
                &format!("tcps://{addr}"),
                &key,
                &cert,
                &ca,
                10,
                bollard::API_DEFAULT_VERSION,
            )?,
        };
        Ok(BollardDaemon { docker })
    }

    fn container_info_from_summary(summary: bollard::models::ContainerSummary) -> ContainerInfo {
        let name = summary
            .names
            .and_then(|names| names.into_iter().next())
            .map(|n| crate::strip_leading_slash(&n))
            .unwrap_or_default();
        ContainerInfo {
            id: summary.id.unwrap_or_default(),
            name,
            image: summary.image.unwrap_or_default(),
            state: summary.state.unwrap_or_default(),
            labels: summary.labels.unwrap_or_default().into_iter().collect(),
        }
    }
}

#[async_trait]
impl Daemon for BollardDaemon {
    async fn list_containers(&self, scope: ListScope) -> Result<Vec<ContainerInfo>, Error> {
        let all = matches!(scope, ListScope::All);
        let options = Some(ListContainersOptions::<String> {
            all,
            ..Default::default()
        });
        let summaries = self.docker.list_containers(options).await?;
        Ok(summaries
            .into_iter()
            .map(Self::container_info_from_summary)
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspect, Error> {
        let resp = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;

        let name = resp
            .name
            .as_deref()
            .map(crate::strip_leading_slash)
            .unwrap_or_default();
        let image = resp
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        let labels = resp
            .config
            .as_ref()
            .and_then(|c| c.labels.clone())
            .unwrap_or_default()
            .into_iter()
            .collect();

        let config = serde_json::to_value(&resp.config).unwrap_or(serde_json::Value::Null);
        let host_config = serde_json::to_value(&resp.host_config).unwrap_or(serde_json::Value::Null);

        let mut networks = BTreeMap::new();
        if let Some(net_settings) = resp.network_settings {
            if let Some(nets) = net_settings.networks {
                for (name, endpoint) in nets {
                    networks.insert(name, portable_endpoint_fields(&endpoint));
                }
            }
        }

        Ok(ContainerInspect {
            id: resp.id.unwrap_or_default(),
            name,
            image,
            config,
            host_config,
            networks,
            labels,
        })
    }

    async fn create(&self, spec: &CreateSpec) -> Result<String, Error> {
        let mut config: Config<String> = serde_json::from_value(spec.config.clone())
            .map_err(|e| Error::BadCreateConfig(e.to_string()))?;
        config.image = Some(spec.image.clone());

        let host_config: Option<HostConfig> = if spec.host_config.is_null() {
            None
        } else {
            Some(
                serde_json::from_value(spec.host_config.clone())
                    .map_err(|e| Error::BadCreateConfig(e.to_string()))?,
            )
        };
        config.host_config = host_config;

        if !spec.networks.is_empty() {
            let endpoints = spec
                .networks
                .iter()
                .map(|(name, endpoint)| (name.clone(), rebuild_endpoint_settings(endpoint)))
                .collect();
            config.networking_config = Some(NetworkingConfig {
                endpoints_config: endpoints,
            });
        }

        let options = Some(CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        });
        let ContainerCreateResponse { id, .. } = self.docker.create_container(options, config).await?;
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), Error> {
        self.docker.start_container::<String>(id, None).await?;
        Ok(())
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), Error> {
        let options = Some(StopContainerOptions {
            t: grace.as_secs() as i64,
        });
        self.docker.stop_container(id, options).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), Error> {
        let options = Some(RemoveContainerOptions {
            force: false,
            ..Default::default()
        });
        self.docker.remove_container(id, options).await?;
        Ok(())
    }

    async fn restart(&self, id: &str) -> Result<(), Error> {
        self.docker.restart_container(id, None).await?;
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<(), Error> {
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress?;
            trace!(?progress, "pull progress");
        }
        Ok(())
    }

    async fn image_digest(&self, image: &str) -> Result<String, Error> {
        let info = self.docker.inspect_image(image).await?;
        info.repo_digests
            .unwrap_or_default()
            .into_iter()
            .find_map(|rd| rd.split('@').nth(1).map(str::to_string))
            .ok_or(Error::MissingDigestLabel)
    }

    async fn distribution_digest(&self, image: &str) -> Result<String, Error> {
        let dist = self.docker.inspect_registry_image(image, None).await?;
        dist.descriptor
            .digest
            .ok_or(Error::MissingDigestLabel)
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, Error> {
        let options = Some(ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        });
        let images = self.docker.list_images(options).await?;
        Ok(images
            .into_iter()
            .map(|i| ImageInfo {
                id: i.id,
                repo_tags: i.repo_tags,
                in_use: false,
            })
            .collect())
    }

    async fn prune_images(&self) -> Result<u64, Error> {
        let report = self.docker.prune_images::<String>(None).await?;
        Ok(report.space_reclaimed.unwrap_or(0) as u64)
    }

    async fn remove_image(&self, id: &str) -> Result<(), Error> {
        let options = Some(RemoveImageOptions {
            force: false,
            ..Default::default()
        });
        self.docker.remove_image(id, options, None).await?;
        Ok(())
    }

    async fn tag_image(&self, id: &str, repo: &str, tag: &str) -> Result<(), Error> {
        let options = TagImageOptions {
            repo: repo.to_string(),
            tag: tag.to_string(),
        };
        self.docker.tag_image(id, Some(options)).await?;
        Ok(())
    }

    async fn exec(&self, id: &str, command: &[String], opts: ExecOptions) -> Result<ExecResult, Error> {
        let create_options = CreateExecOptions {
            cmd: Some(command.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let exec = self.docker.create_exec(id, create_options).await?;

        let run = async {
            let mut output = String::new();
            if let StartExecResults::Attached { output: mut stream, .. } =
                self.docker.start_exec(&exec.id, None).await?
            {
                while let Some(chunk) = stream.next().await {
                    // stdout and stderr are merged here deliberately; callers cannot
                    // distinguish the two streams.
                    output.push_str(&chunk?.to_string());
                }
            }
            Ok::<String, bollard::errors::Error>(output)
        };

        let output = tokio::time::timeout(opts.timeout, run)
            .await
            .map_err(|_| Error::Timeout)??;

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect
            .exit_code
            .unwrap_or(0)
            .clamp(i32::MIN as i64, i32::MAX as i64) as i32;

        Ok(ExecResult { exit_code, output })
    }

    async fn logs(&self, id: &str, tail: u64) -> Result<String, Error> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.logs(id, options);
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => output.push_str(&log.to_string()),
                Err(e) => {
                    // TTY-mode demultiplexing can fail; fall back to whatever raw bytes we
                    // already have rather than losing the whole read.
                    warn!(error = ?e, "log demux failed, returning partial output");
                    break;
                }
            }
        }
        Ok(output)
    }
}

fn portable_endpoint_fields(settings: &EndpointSettings) -> NetworkEndpoint {
    NetworkEndpoint {
        network_id: settings.network_id.clone().unwrap_or_default(),
        aliases: settings.aliases.clone().unwrap_or_default(),
        driver_opts: settings
            .driver_opts
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect(),
        ipam_config: settings
            .ipam_config
            .as_ref()
            .map(|c| serde_json::to_value(c).unwrap_or(serde_json::Value::Null)),
        mac_address: settings.mac_address.clone(),
    }
}

fn rebuild_endpoint_settings(endpoint: &NetworkEndpoint) -> EndpointSettings {
    EndpointSettings {
        network_id: Some(endpoint.network_id.clone()),
        aliases: Some(endpoint.aliases.clone()),
        driver_opts: Some(endpoint.driver_opts.clone().into_iter().collect()),
        ipam_config: endpoint
            .ipam_config
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        mac_address: endpoint.mac_address.clone(),
        // deliberately omitted: ip_address / gateway are daemon-assigned, not carried over
        ..Default::default()
    }
}
