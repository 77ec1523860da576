mod backoff;
mod certstore;
mod config;
mod dedup;
mod enroll;
mod fsutil;
mod journal;
mod policy;
mod recreate;
mod session;
mod tls;

use std::sync::Arc;

use clap::Parser;
use sentinel_docker::{BollardDaemon, ConnectConfig, Daemon};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::certstore::CertStore;
use crate::config::Args;
use crate::journal::OfflineJournal;
use crate::policy::PolicyCache;
use crate::session::Agent;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    std::fs::create_dir_all(&args.data_dir)?;

    let certs = CertStore::new(args.data_dir.clone());
    if !certs.is_enrolled() && args.enroll_token.is_none() {
        anyhow::bail!("agent is not enrolled and no --enroll-token / SENTINEL_ENROLL_TOKEN was given");
    }

    let journal = OfflineJournal::load(args.data_dir.join("offline_journal.json"))?;
    let policy = PolicyCache::load(args.data_dir.join("policy_cache.json"))?;

    let daemon: Arc<dyn Daemon> = Arc::new(connect_daemon(&args).await?);

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let agent = Agent::new(args, certs, daemon, journal, policy);
    if let Err(e) = agent.run(token).await {
        error!(error = %e, "agent exited with an error");
    }
    Ok(())
}

async fn connect_daemon(args: &Args) -> anyhow::Result<BollardDaemon> {
    let tls = match (&args.docker_tls_ca, &args.docker_tls_cert, &args.docker_tls_key) {
        (Some(ca), Some(cert), Some(key)) => Some((ca.clone(), cert.clone(), key.clone())),
        _ => None,
    };
    let config = ConnectConfig::from_url(&args.docker_host, tls);
    Ok(BollardDaemon::connect(config)?)
}
