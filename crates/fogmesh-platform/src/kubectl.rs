//! `kubectl`-backed platform client.
//!
//! Every operation runs `kubectl` with an argument vector. Manifests are
//! rendered as JSON and piped to `kubectl apply -f -`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fogmesh_core::config::PlatformConfig;

use crate::client::{NodeSource, PlatformClient};
use crate::error::{PlatformError, PlatformResult};
use crate::node::{NodeEvent, PlatformNode};
use crate::workload::{ExposureSpec, WorkloadSpec};

const WATCH_CHANNEL_CAPACITY: usize = 64;
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct Kubectl {
    executable: PathBuf,
    namespace: String,
    kubeconfig: Option<PathBuf>,
}

impl Kubectl {
    pub fn new(executable: PathBuf, namespace: impl Into<String>, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            executable,
            namespace: namespace.into(),
            kubeconfig,
        }
    }

    /// Resolve the configured `kubectl` on `PATH`.
    pub fn from_config(config: &PlatformConfig) -> PlatformResult<Self> {
        let executable = which::which(&config.kubectl).map_err(|e| {
            PlatformError::Configuration(format!("cannot find {}: {e}", config.kubectl))
        })?;
        let kubeconfig = (!config.kubeconfig.is_empty()).then(|| PathBuf::from(&config.kubeconfig));

        info!(
            kubectl = %executable.display(),
            namespace = %config.namespace,
            "platform client ready"
        );
        Ok(Self::new(executable, config.namespace.clone(), kubeconfig))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.executable);
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        cmd.arg("--namespace").arg(&self.namespace);
        cmd.args(args);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run to completion, optionally feeding `input` on stdin, and return stdout.
    async fn run(&self, args: &[&str], input: Option<Vec<u8>>) -> PlatformResult<Vec<u8>> {
        let command_line = format!("kubectl {}", args.join(" "));
        debug!(command = %command_line, "running kubectl");

        let mut child = self
            .command(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PlatformError::Launch {
                program: self.executable.display().to_string(),
                source,
            })?;

        let writer = match (input, child.stdin.take()) {
            (Some(bytes), Some(mut stdin)) => Some(tokio::spawn(async move {
                stdin.write_all(&bytes).await?;
                stdin.shutdown().await
            })),
            _ => None,
        };

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(PlatformError::Io(e)),
                Err(e) => return Err(PlatformError::Io(io::Error::other(e))),
            }
        }

        if !output.status.success() {
            return Err(PlatformError::CommandFailed {
                command: command_line,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }

    async fn apply(&self, manifest: &Value) -> PlatformResult<()> {
        let bytes = serde_json::to_vec(manifest)?;
        self.run(&["apply", "-f", "-"], Some(bytes)).await?;
        Ok(())
    }

    async fn delete(&self, kind: &str, name: &str) -> PlatformResult<()> {
        let result = self
            .run(
                &["delete", kind, name, "--cascade=foreground", "--ignore-not-found=false"],
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(PlatformError::CommandFailed { stderr, .. }) if is_not_found(&stderr) => {
                Err(PlatformError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PlatformClient for Kubectl {
    async fn apply_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        self.apply(&workload_manifest(spec, &self.namespace)).await?;
        info!(workload = %spec.name, node = %spec.node_name, "workload applied");
        Ok(())
    }

    async fn delete_workload(&self, name: &str) -> PlatformResult<()> {
        self.delete("deployment", name).await?;
        info!(workload = %name, "workload deleted");
        Ok(())
    }

    async fn apply_exposure(&self, spec: &ExposureSpec) -> PlatformResult<()> {
        self.apply(&exposure_manifest(spec, &self.namespace)).await?;
        info!(exposure = %spec.name, node_port = spec.node_port, "exposure applied");
        Ok(())
    }

    async fn delete_exposure(&self, name: &str) -> PlatformResult<()> {
        self.delete("service", name).await?;
        info!(exposure = %name, "exposure deleted");
        Ok(())
    }
}

#[async_trait]
impl NodeSource for Kubectl {
    async fn list_nodes(&self) -> PlatformResult<Vec<PlatformNode>> {
        let stdout = self.run(&["get", "nodes", "-o", "json"], None).await?;
        parse_node_list(&stdout)
    }

    async fn watch(&self) -> PlatformResult<mpsc::Receiver<PlatformResult<NodeEvent>>> {
        let mut child = self
            .command(&["get", "nodes", "--watch", "--output-watch-events", "-o", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PlatformError::Launch {
                program: self.executable.display().to_string(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlatformError::Io(io::Error::other("kubectl stdout not captured")))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(stderr = %line.trim(), "kubectl watch");
                }
            });
        }

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut decoder = WatchDecoder::default();
            let mut chunk = vec![0u8; READ_CHUNK];

            loop {
                let n = match stdout.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        let _ = tx.send(Err(PlatformError::Io(e))).await;
                        break;
                    }
                };

                for event in decoder.feed(&chunk[..n]) {
                    if tx.send(event).await.is_err() {
                        // Receiver gone; dropping the child kills kubectl.
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if !status.success() => {
                    let _ = tx
                        .send(Err(PlatformError::CommandFailed {
                            command: "kubectl get nodes --watch".to_string(),
                            status: status.to_string(),
                            stderr: String::new(),
                        }))
                        .await;
                }
                Ok(_) => debug!("kubectl watch exited"),
                Err(e) => {
                    let _ = tx.send(Err(PlatformError::Io(e))).await;
                }
            }
        });

        Ok(rx)
    }
}

// ── Manifests ──────────────────────────────────────────────────────

pub fn workload_manifest(spec: &WorkloadSpec, namespace: &str) -> Value {
    let containers: Vec<Value> = spec
        .containers
        .iter()
        .map(|c| {
            let env: Vec<Value> = c
                .env
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            let ports: Vec<Value> = c
                .ports
                .iter()
                .map(|p| json!({ "containerPort": p }))
                .collect();
            json!({
                "name": c.name,
                "image": c.image,
                "imagePullPolicy": c.pull_policy.to_string(),
                "securityContext": { "privileged": c.privileged },
                "env": env,
                "ports": ports,
            })
        })
        .collect();

    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
        },
        "spec": {
            "replicas": 1,
            "selector": { "matchLabels": spec.labels },
            "template": {
                "metadata": { "labels": spec.labels },
                "spec": {
                    "nodeName": spec.node_name,
                    "containers": containers,
                },
            },
        },
    })
}

pub fn exposure_manifest(spec: &ExposureSpec, namespace: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
        },
        "spec": {
            "type": "LoadBalancer",
            "selector": spec.selector,
            "ports": [{
                "name": spec.name,
                "protocol": "TCP",
                "port": spec.port,
                "targetPort": spec.target_port,
                "nodePort": spec.node_port,
            }],
        },
    })
}

// ── Decoding ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<PlatformNode>,
}

/// kubectl reports a missing object as `Error from server (NotFound): ...`.
pub fn is_not_found(stderr: &str) -> bool {
    stderr.contains("(NotFound)")
}

pub fn parse_node_list(bytes: &[u8]) -> PlatformResult<Vec<PlatformNode>> {
    let list: NodeList = serde_json::from_slice(bytes)?;
    Ok(list.items)
}

#[derive(Deserialize)]
struct WatchEvent {
    #[serde(rename = "type")]
    kind: String,
    object: PlatformNode,
}

impl WatchEvent {
    fn into_node_event(self) -> Option<NodeEvent> {
        match self.kind.as_str() {
            "ADDED" => Some(NodeEvent::Added(self.object)),
            "MODIFIED" => Some(NodeEvent::Modified(self.object)),
            "DELETED" => Some(NodeEvent::Deleted(self.object)),
            other => {
                debug!(kind = %other, "ignoring watch event");
                None
            }
        }
    }
}

/// Incremental decoder for the concatenated JSON objects `kubectl --watch`
/// prints. Objects may be split across reads.
#[derive(Debug, Default)]
pub struct WatchDecoder {
    buf: Vec<u8>,
}

impl WatchDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<PlatformResult<NodeEvent>> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<WatchEvent>();
        let mut consumed = 0;

        loop {
            match stream.next() {
                Some(Ok(raw)) => {
                    consumed = stream.byte_offset();
                    events.extend(raw.into_node_event().map(Ok));
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    // Resynchronizing inside a corrupt object is not possible.
                    consumed = self.buf.len();
                    events.push(Err(PlatformError::Decode(e)));
                    break;
                }
                None => {
                    consumed = stream.byte_offset();
                    break;
                }
            }
        }

        self.buf.drain(..consumed);
        events
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
