//! The agent lifecycle state machine and the connected-phase dispatch loop.
//!
//! `unenrolled -> enrolling -> connecting -> connected`, with any break in `connected`
//! dropping to `disconnected` and, past the configured grace period, `autonomous` — which
//! races back to `connecting` on its own schedule rather than waiting to be told.

use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{JournalEntry, SessionState};
use sentinel_docker::{Daemon, ListScope};
use sentinel_proto::framing;
use sentinel_proto::{AgentMessage, ContainerSummary, EnrollRequest, EnrollResponse, Outcome, ServerMessage, StateReport, StateReportAck};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use rustls::pki_types::ServerName;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::dedup::Dedup;
use crate::{certstore::CertStore, enroll, journal::OfflineJournal, policy::PolicyCache, recreate, tls};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// The feature set advertised both in the connect-time `StateReport` and every recurring
/// heartbeat — kept as one list so the two can never drift apart.
const AGENT_FEATURES: &[&str] = &["journal", "policy-sync"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Io(#[from] std::io::Error),
    Tls(#[from] tls::Error),
    Framing(#[from] framing::Error),
    Enroll(#[from] enroll::Error),
    Certstore(#[from] crate::certstore::Error),
    Daemon(#[from] sentinel_docker::Error),
    EnrollmentRejected(String),
    NotEnrolled,
    InvalidServerAddr(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// All shared handles a dispatched command needs, cloned cheaply into its own task.
#[derive(Clone)]
struct Handles {
    daemon: Arc<dyn Daemon>,
    journal: Arc<OfflineJournal>,
    policy: Arc<PolicyCache>,
    certs: Arc<CertStore>,
}

pub struct Agent {
    args: Arc<Args>,
    certs: Arc<CertStore>,
    dedup: Arc<Dedup>,
    handles: Handles,
    state: SessionState,
}

impl Agent {
    pub fn new(
        args: Args,
        certs: CertStore,
        daemon: Arc<dyn Daemon>,
        journal: OfflineJournal,
        policy: PolicyCache,
    ) -> Self {
        let certs = Arc::new(certs);
        Agent {
            args: Arc::new(args),
            certs: certs.clone(),
            dedup: Arc::new(Dedup::new()),
            handles: Handles {
                daemon,
                journal: Arc::new(journal),
                policy: Arc::new(policy),
                certs,
            },
            state: SessionState::Unenrolled,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs until cancelled. `token` cancels the whole agent, including any in-flight
    /// autonomous subtask.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), Error> {
        let mut backoff = crate::backoff::Backoff::new();
        let mut autonomous: Option<(CancellationToken, tokio::task::JoinHandle<()>)> = None;

        while !token.is_cancelled() {
            if !self.certs.is_enrolled() {
                self.state = SessionState::Enrolling;
                if let Err(e) = self.enroll().await {
                    error!(error = %e, "enrollment failed");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(10)) => {}
                        _ = token.cancelled() => break,
                    }
                }
                continue;
            }

            if let Some((autonomous_token, handle)) = autonomous.take() {
                autonomous_token.cancel();
                let _ = handle.await;
            }

            self.state = SessionState::Connecting;
            backoff.mark_session_start();
            let outcome = tokio::select! {
                result = self.connect_and_serve() => result,
                _ = token.cancelled() => break,
            };
            backoff.mark_session_end();

            if let Err(e) = outcome {
                warn!(error = %e, "session ended, entering disconnected");
            }
            self.state = SessionState::Disconnected;

            let grace = self.handles.policy.grace_period_offline().await;
            if autonomous.is_none() {
                let autonomous_token = CancellationToken::new();
                let handle = self.spawn_autonomous(autonomous_token.clone(), grace);
                autonomous = Some((autonomous_token, handle));
            }

            let delay = backoff.next();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => break,
            }
        }

        if let Some((autonomous_token, handle)) = autonomous.take() {
            autonomous_token.cancel();
            let _ = handle.await;
        }
        Ok(())
    }

    /// `unenrolled -> enrolling`: generate a CSR, dial the server with server-verification
    /// disabled, present the enrollment token, and persist the returned identity.
    async fn enroll(&self) -> Result<(), Error> {
        let token = self
            .args
            .enroll_token
            .clone()
            .ok_or_else(|| Error::EnrollmentRejected("no enrollment token configured".to_string()))?;

        let host_name = hostname();
        let generated = enroll::generate_csr(&host_name)?;

        let connector = tls::enrollment_connector()?;
        let tcp = TcpStream::connect(&self.args.server_addr).await?;
        let server_name = server_name_for(&self.args.server_addr)?;
        let mut stream = connector.connect(server_name, tcp).await?;

        let request = EnrollRequest {
            token,
            host_name: host_name.clone(),
            csr_der: generated.csr_der,
        };
        framing::write_frame(&mut stream, &request).await?;
        let response: EnrollResponse = framing::read_frame(&mut stream).await?;

        self.certs.persist_enrollment(
            response.ca_cert_pem.as_bytes(),
            response.agent_cert_pem.as_bytes(),
            &response.host_id,
            generated.key_pair_pem.as_bytes(),
        )?;

        info!(host_id = %response.host_id, "enrolled");
        Ok(())
    }

    /// `connecting -> connected`: dial mTLS, report state, replay the offline journal, then
    /// run the heartbeat and receive loops until either ends.
    async fn connect_and_serve(&mut self) -> Result<(), Error> {
        let identity = self.certs.load()?.ok_or(Error::NotEnrolled)?;
        let connector = tls::mutual_tls_connector(&identity.ca_pem, &identity.agent_cert_pem, &identity.agent_key_pem)?;
        let tcp = TcpStream::connect(&self.args.server_addr).await?;
        let server_name = server_name_for(&self.args.server_addr)?;
        let mut stream = connector.connect(server_name, tcp).await?;

        let containers = self.list_summaries().await?;
        let report = StateReport {
            host_id: identity.host_id.clone(),
            containers,
            timestamp: chrono::Utc::now(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            features: AGENT_FEATURES.iter().map(|s| s.to_string()).collect(),
        };
        framing::write_frame(&mut stream, &report).await?;
        let ack: StateReportAck = framing::read_frame(&mut stream).await?;
        if !ack.accepted {
            return Err(Error::EnrollmentRejected(ack.message));
        }

        self.state = SessionState::Connected;
        info!(host_id = %identity.host_id, "connected");

        let drain_result = self
            .handles
            .journal
            .drain(|entries| async {
                framing::write_frame(&mut stream, &AgentMessage::JournalEntries { entries })
                    .await
                    .map_err(|e| crate::journal::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
            })
            .await;
        if let Err(e) = drain_result {
            warn!(error = %e, "failed to replay offline journal");
        }

        self.run_connected(stream, identity.host_id).await
    }

    async fn list_summaries(&self) -> Result<Vec<ContainerSummary>, Error> {
        let containers = self.handles.daemon.list_containers(ListScope::All).await?;
        let mut summaries = Vec::new();
        for c in containers.into_iter().filter(|c| !c.is_swarm_task()) {
            let policy = self.handles.policy.resolve_policy(&c.name, None).await;
            summaries.push(ContainerSummary {
                id: c.id,
                name: c.name,
                image: c.image,
                state: c.state,
                policy,
            });
        }
        Ok(summaries)
    }

    async fn run_connected<S>(&self, stream: S, host_id: String) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut read_half, write_half) = tokio::io::split(stream);
        let write_half = Arc::new(AsyncMutex::new(write_half));

        let heartbeat_write = write_half.clone();
        let heartbeat_host_id = host_id.clone();
        let mut heartbeat_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it, connect already reported state
            loop {
                ticker.tick().await;
                let msg = AgentMessage::Heartbeat {
                    host_id: heartbeat_host_id.clone(),
                    agent_version: env!("CARGO_PKG_VERSION").to_string(),
                    features: AGENT_FEATURES.iter().map(|s| s.to_string()).collect(),
                };
                let mut w = heartbeat_write.lock().await;
                if framing::write_frame(&mut *w, &msg).await.is_err() {
                    return;
                }
            }
        });

        let dedup = self.dedup.clone();
        let handles = self.handles.clone();
        let mut receive_task = tokio::spawn(async move {
            loop {
                let msg: ServerMessage = match framing::read_frame(&mut read_half).await {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "receive loop ended");
                        return;
                    }
                };
                if let Some(request_id) = request_id_of(&msg) {
                    if dedup.is_seen(request_id).await {
                        continue;
                    }
                }
                let handles = handles.clone();
                let write_half = write_half.clone();
                guarded("dispatch", dispatch(msg, handles, write_half));
            }
        });

        tokio::select! {
            _ = &mut heartbeat_task => {}
            _ = &mut receive_task => {}
        }
        heartbeat_task.abort();
        receive_task.abort();
        Err(Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "session ended")))
    }

    /// `disconnected -> autonomous`: once the grace period elapses, start polling the local
    /// daemon on the configured interval. Never contacts a registry or mutates a container —
    /// it only lists and summarizes what's running.
    fn spawn_autonomous(&self, token: CancellationToken, grace: Duration) -> tokio::task::JoinHandle<()> {
        let handles = self.handles.clone();
        let poll_interval_default = Duration::from_secs(self.args.poll_interval_secs);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {}
                _ = token.cancelled() => return,
            }
            let interval = handles.policy.poll_interval().await.max(poll_interval_default.min(poll_interval_default));
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match handles.daemon.list_containers(ListScope::All).await {
                            Ok(containers) => {
                                info!(count = containers.len(), "autonomous poll: containers observed");
                            }
                            Err(e) => warn!(error = %e, "autonomous poll failed"),
                        }
                    }
                    _ = token.cancelled() => return,
                }
            }
        })
    }
}

fn request_id_of(msg: &ServerMessage) -> Option<&str> {
    match msg {
        ServerMessage::UpdateContainer { request_id, .. }
        | ServerMessage::ContainerAction { request_id, .. }
        | ServerMessage::PullImage { request_id, .. }
        | ServerMessage::RunHook { request_id, .. }
        | ServerMessage::Rollback { request_id, .. } => Some(request_id),
        ServerMessage::Heartbeat
        | ServerMessage::ListContainers
        | ServerMessage::PolicySync { .. }
        | ServerMessage::SettingsSync(_)
        | ServerMessage::CertRenewalResponse { .. } => None,
    }
}

/// Spawns `fut` as its own detached task, and a second task watching for a panic inside it —
/// so a panicking handler never takes the receive loop down with it.
fn guarded(label: &'static str, fut: impl std::future::Future<Output = ()> + Send + 'static) {
    let handle = tokio::spawn(fut);
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            error!(command = label, error = %e, "command handler panicked");
        }
    });
}

async fn dispatch<W>(msg: ServerMessage, handles: Handles, write_half: Arc<AsyncMutex<W>>)
where
    W: AsyncWrite + Unpin,
{
    let reply = match msg {
        ServerMessage::Heartbeat => None,
        ServerMessage::ListContainers => match handles.daemon.list_containers(ListScope::All).await {
            Ok(containers) => {
                let mut summaries = Vec::new();
                for c in containers.into_iter().filter(|c| !c.is_swarm_task()) {
                    let policy = handles.policy.resolve_policy(&c.name, None).await;
                    summaries.push(ContainerSummary {
                        id: c.id,
                        name: c.name,
                        image: c.image,
                        state: c.state,
                        policy,
                    });
                }
                Some(AgentMessage::ContainerList { containers: summaries })
            }
            Err(e) => {
                error!(error = %e, "list-containers failed");
                None
            }
        },
        ServerMessage::UpdateContainer { request_id, container, target_image } => {
            let (outcome, entry) = recreate::update_container(&*handles.daemon, &container, &target_image).await;
            record_journal(&handles, entry).await;
            Some(AgentMessage::UpdateResult {
                request_id,
                container,
                outcome: outcome.outcome,
                old_digest: outcome.old_digest,
                new_digest: outcome.new_digest,
                duration_ms: outcome.duration_ms,
                error: outcome.error,
            })
        }
        ServerMessage::ContainerAction { request_id, container, action } => {
            Some(handle_container_action(&handles, request_id, container, action).await)
        }
        ServerMessage::PullImage { request_id, image } => {
            let result = handles.daemon.pull(&image).await;
            Some(AgentMessage::PullImageResult {
                request_id,
                outcome: if result.is_ok() { Outcome::Success } else { Outcome::Failed },
                error: result.err().map(|e| e.to_string()),
            })
        }
        ServerMessage::RunHook { request_id, container, command, timeout_secs } => {
            Some(run_hook(&handles, request_id, &container, &command, timeout_secs).await)
        }
        ServerMessage::Rollback { request_id, .. } => Some(AgentMessage::RollbackResult {
            request_id,
            outcome: Outcome::NotImplemented,
            error: Some("rollback is not implemented".to_string()),
        }),
        ServerMessage::PolicySync { policies, default_policy } => {
            if let Err(e) = handles.policy.apply_policy_sync(policies, default_policy).await {
                error!(error = %e, "policy-sync persist failed");
            }
            None
        }
        ServerMessage::SettingsSync(update) => {
            if let Err(e) = handles.policy.apply_settings_sync(update).await {
                error!(error = %e, "settings-sync persist failed");
            }
            None
        }
        ServerMessage::CertRenewalResponse { certificate_pem } => {
            if certificate_pem.is_empty() {
                error!("cert-renewal-response carried an empty certificate");
            } else if let Err(e) = handles.certs.overwrite_agent_cert(certificate_pem.as_bytes()) {
                error!(error = %e, "failed to persist renewed agent certificate");
            } else {
                info!("agent certificate renewed");
            }
            None
        }
    };

    if let Some(reply) = reply {
        let mut w = write_half.lock().await;
        if let Err(e) = framing::write_frame(&mut *w, &reply).await {
            warn!(error = %e, "failed to send command reply");
        }
    }
}

async fn handle_container_action(
    handles: &Handles,
    request_id: String,
    container: String,
    action: sentinel_proto::ContainerActionKind,
) -> AgentMessage {
    let containers = match handles.daemon.list_containers(ListScope::All).await {
        Ok(c) => c,
        Err(e) => {
            return AgentMessage::ContainerActionResult {
                request_id,
                container,
                outcome: Outcome::Failed,
                error: Some(e.to_string()),
            };
        }
    };
    let Some(info) = containers.into_iter().find(|c| c.name == container) else {
        return AgentMessage::ContainerActionResult {
            request_id,
            container,
            outcome: Outcome::Failed,
            error: Some("container not found".to_string()),
        };
    };

    let result = match action {
        sentinel_proto::ContainerActionKind::Stop => handles.daemon.stop(&info.id, Duration::from_secs(30)).await,
        sentinel_proto::ContainerActionKind::Start => handles.daemon.start(&info.id).await,
        sentinel_proto::ContainerActionKind::Restart => handles.daemon.restart(&info.id).await,
    };

    AgentMessage::ContainerActionResult {
        request_id,
        container,
        outcome: if result.is_ok() { Outcome::Success } else { Outcome::Failed },
        error: result.err().map(|e| e.to_string()),
    }
}

/// A 30-second default timeout, an empty command is rejected outright rather than exec'd
/// against an empty argv.
async fn run_hook(
    handles: &Handles,
    request_id: String,
    container: &str,
    command: &str,
    timeout_secs: Option<i64>,
) -> AgentMessage {
    let argv: Vec<String> = command.split_whitespace().map(String::from).collect();
    if argv.is_empty() {
        return AgentMessage::RunHookResult {
            request_id,
            exit_code: -1,
            output: String::new(),
            outcome: Outcome::Failed,
            error: Some("empty command".to_string()),
        };
    }

    let containers = match handles.daemon.list_containers(ListScope::All).await {
        Ok(c) => c,
        Err(e) => {
            return AgentMessage::RunHookResult {
                request_id,
                exit_code: -1,
                output: String::new(),
                outcome: Outcome::Failed,
                error: Some(e.to_string()),
            };
        }
    };
    let Some(info) = containers.into_iter().find(|c| c.name == container) else {
        return AgentMessage::RunHookResult {
            request_id,
            exit_code: -1,
            output: String::new(),
            outcome: Outcome::Failed,
            error: Some("container not found".to_string()),
        };
    };

    let timeout = timeout_secs
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64))
        .unwrap_or(Duration::from_secs(30));

    match handles.daemon.exec(&info.id, &argv, sentinel_docker::ExecOptions { timeout }).await {
        Ok(result) => AgentMessage::RunHookResult {
            request_id,
            exit_code: result.exit_code,
            output: result.output,
            outcome: if result.exit_code == 0 { Outcome::Success } else { Outcome::Failed },
            error: None,
        },
        Err(e) => AgentMessage::RunHookResult {
            request_id,
            exit_code: -1,
            output: String::new(),
            outcome: Outcome::Failed,
            error: Some(e.to_string()),
        },
    }
}

async fn record_journal(handles: &Handles, mut entry: JournalEntry) {
    let id_bytes: [u8; 8] = rand::random();
    entry.id = hex::encode(id_bytes);
    if let Err(e) = handles.journal.add(entry).await {
        warn!(error = %e, "failed to append offline journal entry");
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

fn server_name_for(addr: &str) -> Result<ServerName<'static>, Error> {
    let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(addr);
    ServerName::try_from(host.to_string()).map_err(|_| Error::InvalidServerAddr(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn request_id_present_only_for_command_variants() {
        assert!(request_id_of(&ServerMessage::Heartbeat).is_none());
        assert_eq!(
            request_id_of(&ServerMessage::PullImage {
                request_id: "r1".to_string(),
                image: "nginx:latest".to_string(),
            }),
            Some("r1")
        );
    }

    #[test]
    fn server_name_strips_port() {
        let name = server_name_for("sentinel.example.com:8443").unwrap();
        assert_eq!(format!("{:?}", name), format!("{:?}", ServerName::try_from("sentinel.example.com".to_string()).unwrap()));
    }

    fn test_agent(daemon: Arc<dyn Daemon>) -> Agent {
        test_agent_with_dir(daemon).0
    }

    fn test_agent_with_dir(daemon: Arc<dyn Daemon>) -> (Agent, tempfile::TempDir) {
        let args = Args::parse_from(["sentinel-agent", "--server-addr", "127.0.0.1:0"]);
        let dir = tempfile::tempdir().unwrap();
        let certs = CertStore::new(dir.path().to_path_buf());
        certs.persist_enrollment(b"ca", b"cert-v1", "host-1", b"key").unwrap();
        let journal = OfflineJournal::load(dir.path().join("journal.json")).unwrap();
        let policy = PolicyCache::load(dir.path().join("policy.json")).unwrap();
        (Agent::new(args, certs, daemon, journal, policy), dir)
    }

    /// Drives `run_connected` end to end over an in-process duplex pipe standing in for the
    /// mTLS stream: one side is the agent under test, the other plays the server, issuing
    /// commands and reading back replies.
    #[tokio::test]
    async fn run_connected_dispatches_list_and_update_then_ends_on_disconnect() {
        let mock = sentinel_docker::mock::MockDaemon::new().with_container("web", "nginx:1.25", "sha256:old");
        mock.set_image_digest("nginx:1.26", "sha256:new");
        let agent = test_agent(Arc::new(mock));

        let (agent_side, server_side) = tokio::io::duplex(8192);
        let mut server_side = server_side;

        let agent_task = tokio::spawn(async move { agent.run_connected(agent_side, "host-1".to_string()).await });

        framing::write_frame(&mut server_side, &ServerMessage::ListContainers).await.unwrap();
        let reply: AgentMessage = framing::read_frame(&mut server_side).await.unwrap();
        match reply {
            AgentMessage::ContainerList { containers } => {
                assert_eq!(containers.len(), 1);
                assert_eq!(containers[0].name, "web");
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        framing::write_frame(
            &mut server_side,
            &ServerMessage::UpdateContainer {
                request_id: "req-1".to_string(),
                container: "web".to_string(),
                target_image: "nginx:1.26".to_string(),
            },
        )
        .await
        .unwrap();
        let reply: AgentMessage = framing::read_frame(&mut server_side).await.unwrap();
        match reply {
            AgentMessage::UpdateResult { request_id, outcome, .. } => {
                assert_eq!(request_id, "req-1");
                assert_eq!(outcome, Outcome::Success);
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        drop(server_side);
        let result = agent_task.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_connected_dedupes_repeated_request_ids() {
        let daemon: Arc<dyn Daemon> = Arc::new(sentinel_docker::mock::MockDaemon::new());
        let agent = test_agent(daemon);

        let (agent_side, mut server_side) = tokio::io::duplex(8192);
        let agent_task = tokio::spawn(async move { agent.run_connected(agent_side, "host-1".to_string()).await });

        let pull = ServerMessage::PullImage {
            request_id: "dup-1".to_string(),
            image: "nginx:latest".to_string(),
        };
        framing::write_frame(&mut server_side, &pull).await.unwrap();
        let first: AgentMessage = framing::read_frame(&mut server_side).await.unwrap();
        assert!(matches!(first, AgentMessage::PullImageResult { .. }));

        // A repeated request id must not produce a second reply; prove it by sending a
        // distinguishable follow-up command and observing only its reply comes back.
        framing::write_frame(&mut server_side, &pull).await.unwrap();
        framing::write_frame(&mut server_side, &ServerMessage::ListContainers).await.unwrap();
        let second: AgentMessage = framing::read_frame(&mut server_side).await.unwrap();
        assert!(matches!(second, AgentMessage::ContainerList { .. }));

        drop(server_side);
        let _ = agent_task.await.unwrap();
    }

    #[tokio::test]
    async fn cert_renewal_response_overwrites_agent_certificate_file() {
        let (agent, dir) = test_agent_with_dir(Arc::new(sentinel_docker::mock::MockDaemon::new()));
        let (_unused, writer) = tokio::io::duplex(8192);
        let write_half = Arc::new(AsyncMutex::new(writer));

        dispatch(
            ServerMessage::CertRenewalResponse {
                certificate_pem: "renewed-cert-bytes".to_string(),
            },
            agent.handles.clone(),
            write_half,
        )
        .await;

        let cert_path = dir.path().join("agent.pem");
        assert_eq!(std::fs::read(cert_path).unwrap(), b"renewed-cert-bytes");
    }

    #[tokio::test]
    async fn cert_renewal_response_with_empty_certificate_leaves_existing_cert_untouched() {
        let (agent, dir) = test_agent_with_dir(Arc::new(sentinel_docker::mock::MockDaemon::new()));
        let (_unused, writer) = tokio::io::duplex(8192);
        let write_half = Arc::new(AsyncMutex::new(writer));

        dispatch(
            ServerMessage::CertRenewalResponse {
                certificate_pem: String::new(),
            },
            agent.handles.clone(),
            write_half,
        )
        .await;

        let cert_path = dir.path().join("agent.pem");
        assert_eq!(std::fs::read(cert_path).unwrap(), b"cert-v1");
    }
}
