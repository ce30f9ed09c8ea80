//! Mock container engine and stop detector shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use wsinfra_docker::bollard::errors::Error as BollardError;
use wsinfra_docker::engine::EngineResult;
use wsinfra_docker::{
    ContainerEngine, ContainerListEntry, ContainerSnapshot, EngineError, NetworkSettings,
    PortBinding, StopDetector,
};

#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    #[default]
    Normal,
    /// Every daemon call fails with a server error of this status.
    DaemonError { status_code: u16 },
}

/// In-memory engine; containers are looked up by id.
#[derive(Clone, Default)]
pub struct MockEngine {
    pub containers: Arc<Mutex<HashMap<String, ContainerSnapshot>>>,
    pub removed: Arc<Mutex<Vec<String>>>,
    pub behavior: Arc<Mutex<MockBehavior>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, snapshot: ContainerSnapshot) {
        self.containers
            .lock()
            .await
            .insert(snapshot.id.clone(), snapshot);
    }

    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().await = behavior;
    }

    pub async fn removed(&self) -> Vec<String> {
        self.removed.lock().await.clone()
    }

    async fn check(&self) -> EngineResult<()> {
        match *self.behavior.lock().await {
            MockBehavior::Normal => Ok(()),
            MockBehavior::DaemonError { status_code } => {
                Err(EngineError::DockerApi(BollardError::DockerResponseServerError {
                    status_code,
                    message: "daemon unavailable".to_string(),
                }))
            }
        }
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn inspect_container(&self, container_id: &str) -> EngineResult<ContainerSnapshot> {
        self.check().await?;
        self.containers
            .lock()
            .await
            .get(container_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(container_id.to_string()))
    }

    async fn list_containers(
        &self,
        labels: &[(String, String)],
    ) -> EngineResult<Vec<ContainerListEntry>> {
        self.check().await?;
        let containers = self.containers.lock().await;
        let mut entries: Vec<ContainerListEntry> = containers
            .values()
            .filter(|c| labels.iter().all(|(k, v)| c.labels.get(k) == Some(v)))
            .map(|c| ContainerListEntry {
                id: c.id.clone(),
                labels: c.labels.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn remove_container(&self, container_id: &str) -> EngineResult<()> {
        self.check().await?;
        if self.containers.lock().await.remove(container_id).is_none() {
            return Err(EngineError::NotFound(container_id.to_string()));
        }
        self.removed.lock().await.push(container_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionEvent {
    Started { container_id: String, machine: String },
    Stopped { container_id: String },
}

#[derive(Default)]
pub struct RecordingStopDetector {
    pub events: StdMutex<Vec<DetectionEvent>>,
}

impl RecordingStopDetector {
    pub fn events(&self) -> Vec<DetectionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StopDetector for RecordingStopDetector {
    fn start_detection(&self, container_id: &str, machine_name: &str) {
        self.events.lock().unwrap().push(DetectionEvent::Started {
            container_id: container_id.to_string(),
            machine: machine_name.to_string(),
        });
    }

    fn stop_detection(&self, container_id: &str) {
        self.events.lock().unwrap().push(DetectionEvent::Stopped {
            container_id: container_id.to_string(),
        });
    }
}

/// Snapshot of a started container with the given labels and `port -> host port` bindings.
pub fn snapshot(
    id: &str,
    labels: BTreeMap<String, String>,
    bindings: &[(&str, &str)],
    gateway: Option<&str>,
) -> ContainerSnapshot {
    let ports = bindings
        .iter()
        .map(|(port, host_port)| {
            (
                port.to_string(),
                vec![PortBinding::new(Some("0.0.0.0"), *host_port)],
            )
        })
        .collect();
    ContainerSnapshot {
        id: id.to_string(),
        image: "eclipse/ubuntu_jdk8".to_string(),
        network_settings: NetworkSettings {
            ports,
            gateway: gateway.map(str::to_string),
        },
        labels: labels.into_iter().collect(),
    }
}
