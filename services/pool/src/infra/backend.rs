//! Docker-backed `ContainerBackend` adapter.
//!
//! Brings up / tears down a cluster's multi-container composition read from
//! a JSON template (`COMPOSE_FILE_PATH`), parameterizing `project_name`,
//! `api_port`, and `daemon` per call rather than through process-wide
//! environment mutation, so concurrent compositions on different hosts never
//! clobber each other's settings.

use std::collections::HashMap;

use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig, NetworkCreateRequest, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, ListContainersOptionsBuilder, ListImagesOptionsBuilder,
    RemoveContainerOptionsBuilder, RemoveImageOptionsBuilder, RemoveNetworkOptionsBuilder,
    StartContainerOptionsBuilder, StopContainerOptionsBuilder,
};
use futures::TryStreamExt;
use serde::Deserialize;

use crate::domain::repository::ContainerBackend;
use crate::engine::port_allocator::parse_daemon_url;
use crate::error::PoolError;

/// One service in the composition template on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeService {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    /// If set, this service's container exposes `api_port` on the host.
    #[serde(default)]
    pub expose_api_port: bool,
    /// Container-side port exposed when `expose_api_port` is set.
    #[serde(default)]
    pub container_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComposeTemplate {
    pub services: Vec<ComposeService>,
}

impl ComposeTemplate {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Clone)]
pub struct BollardContainerBackend {
    pub template: std::sync::Arc<ComposeTemplate>,
    pub connect_timeout_secs: u64,
}

impl BollardContainerBackend {
    pub fn new(template: ComposeTemplate, connect_timeout_secs: u64) -> Self {
        Self {
            template: std::sync::Arc::new(template),
            connect_timeout_secs,
        }
    }

    async fn connect(&self, daemon: &str) -> Result<Docker, PoolError> {
        let addr = parse_daemon_url(daemon)?;
        let docker = Docker::connect_with_http(
            &format!("{}:{}", addr.ip, addr.port),
            self.connect_timeout_secs,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| PoolError::BackendUnreachable.context_log(e))?;
        Ok(docker)
    }
}

// Small local helper so a bollard connect/ping failure is logged with its
// cause before being collapsed to the coarse `PoolError` kind callers match on.
trait LogContext {
    fn context_log(self, e: impl std::fmt::Display) -> PoolError;
}
impl LogContext for PoolError {
    fn context_log(self, e: impl std::fmt::Display) -> PoolError {
        tracing::warn!(error = %e, "docker backend error");
        self
    }
}

impl ContainerBackend for BollardContainerBackend {
    async fn ping(&self, daemon: &str) -> Result<bool, PoolError> {
        let docker = match self.connect(daemon).await {
            Ok(d) => d,
            Err(_) => return Ok(false),
        };
        Ok(docker.ping().await.is_ok())
    }

    async fn start_composition(
        &self,
        project_name: &str,
        api_port: u16,
        daemon: &str,
    ) -> Result<Vec<String>, PoolError> {
        let docker = self.connect(daemon).await?;

        let network_name = project_name.to_owned();
        // Idempotent: a prior failed attempt may have already created the network.
        let _ = docker
            .create_network(NetworkCreateRequest {
                name: network_name.clone(),
                driver: Some("bridge".to_owned()),
                ..Default::default()
            })
            .await;

        let mut container_ids = Vec::with_capacity(self.template.services.len());
        for service in &self.template.services {
            let container_name = format!("{project_name}-{}", service.name);

            let mut port_bindings = HashMap::new();
            let mut exposed_ports = Vec::new();
            if service.expose_api_port {
                if let Some(container_port) = service.container_port {
                    let key = format!("{container_port}/tcp");
                    port_bindings.insert(
                        key.clone(),
                        Some(vec![PortBinding {
                            host_ip: Some("0.0.0.0".to_owned()),
                            host_port: Some(api_port.to_string()),
                        }]),
                    );
                    exposed_ports.push(key);
                }
            }

            let config = ContainerCreateBody {
                image: Some(service.image.clone()),
                cmd: if service.command.is_empty() {
                    None
                } else {
                    Some(service.command.clone())
                },
                env: if service.env.is_empty() {
                    None
                } else {
                    Some(service.env.clone())
                },
                exposed_ports: if exposed_ports.is_empty() {
                    None
                } else {
                    Some(exposed_ports)
                },
                host_config: Some(HostConfig {
                    port_bindings: if port_bindings.is_empty() {
                        None
                    } else {
                        Some(port_bindings)
                    },
                    network_mode: Some(network_name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let created = docker
                .create_container(
                    Some(
                        CreateContainerOptionsBuilder::new()
                            .name(&container_name)
                            .build(),
                    ),
                    config,
                )
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, %project_name, service = %service.name, "create_container failed");
                    PoolError::BackendStartFailed
                })?;

            docker
                .start_container(&created.id, Some(StartContainerOptionsBuilder::new().build()))
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, %project_name, service = %service.name, "start_container failed");
                    PoolError::BackendStartFailed
                })?;

            container_ids.push(created.id);
        }

        Ok(container_ids)
    }

    async fn stop_composition(
        &self,
        project_name: &str,
        _api_port: u16,
        daemon: &str,
    ) -> Result<(), PoolError> {
        let docker = self.connect(daemon).await?;

        let mut filters = HashMap::new();
        filters.insert("name".to_owned(), vec![format!("{project_name}-")]);
        let options = ListContainersOptionsBuilder::new()
            .all(true)
            .filters(&filters)
            .build();

        let containers = docker
            .list_containers(Some(options))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, %project_name, "list_containers failed during stop");
                PoolError::BackendUnreachable
            })?;

        for c in containers {
            let Some(id) = c.id else { continue };
            let _ = docker
                .stop_container(&id, Some(StopContainerOptionsBuilder::new().t(10).build()))
                .await;
            let _ = docker
                .remove_container(&id, Some(RemoveContainerOptionsBuilder::new().force(true).build()))
                .await;
        }

        let _ = docker
            .remove_network(project_name, Some(RemoveNetworkOptionsBuilder::new().build()))
            .await;

        Ok(())
    }

    async fn clean_exited(&self, daemon: &str) -> Result<(), PoolError> {
        let docker = match self.connect(daemon).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "clean_exited: could not connect to daemon");
                return Ok(());
            }
        };

        let mut filters = HashMap::new();
        filters.insert("status".to_owned(), vec!["exited".to_owned()]);
        let options = ListContainersOptionsBuilder::new()
            .all(true)
            .filters(&filters)
            .build();

        let containers = match docker.list_containers(Some(options)).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "clean_exited: list_containers failed");
                return Ok(());
            }
        };

        for c in containers {
            if let Some(id) = c.id {
                if let Err(e) = docker
                    .remove_container(&id, Some(RemoveContainerOptionsBuilder::new().force(true).build()))
                    .await
                {
                    tracing::warn!(error = %e, container_id = %id, "clean_exited: remove_container failed");
                }
            }
        }
        Ok(())
    }

    async fn clean_images(&self, daemon: &str, prefix: &str) -> Result<(), PoolError> {
        let docker = match self.connect(daemon).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "clean_images: could not connect to daemon");
                return Ok(());
            }
        };

        let options = ListImagesOptionsBuilder::new().all(true).build();
        let images = match docker.list_images(Some(options)).await {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(error = %e, "clean_images: list_images failed");
                return Ok(());
            }
        };

        for image in images {
            let matches_prefix = image
                .repo_tags
                .iter()
                .any(|tag| tag.starts_with(prefix));
            if !matches_prefix {
                continue;
            }
            if let Err(e) = docker
                .remove_image(&image.id, Some(RemoveImageOptionsBuilder::new().force(true).build()), None)
                .await
            {
                tracing::warn!(error = %e, image_id = %image.id, "clean_images: remove_image failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_compose_template_json() {
        let json = r#"{
            "services": [
                {"name": "peer0", "image": "hyperledger/fabric-peer:2.5", "expose_api_port": true, "container_port": 7051},
                {"name": "orderer", "image": "hyperledger/fabric-orderer:2.5"}
            ]
        }"#;
        let template: ComposeTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.services.len(), 2);
        assert!(template.services[0].expose_api_port);
        assert_eq!(template.services[0].container_port, Some(7051));
        assert!(!template.services[1].expose_api_port);
    }
}
