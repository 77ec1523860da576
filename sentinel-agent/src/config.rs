//! CLI argument parsing for the agent binary.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding persisted state: CA/agent certs, host-id, journal, policy cache.
    #[arg(long, default_value = "/var/lib/sentinel-agent")]
    pub data_dir: PathBuf,

    /// Server address for enrollment and the control channel, `host:port`.
    #[arg(long)]
    pub server_addr: String,

    /// One-time enrollment token, required only while unenrolled. Accepted via env so it
    /// need not appear in a process listing.
    #[arg(long, env = "SENTINEL_ENROLL_TOKEN")]
    pub enroll_token: Option<String>,

    /// Docker daemon URL: a filesystem path for a Unix socket, or `tcp://`/`tcps://`.
    #[arg(long, default_value = "/var/run/docker.sock")]
    pub docker_host: String,

    #[arg(long)]
    pub docker_tls_ca: Option<PathBuf>,

    #[arg(long)]
    pub docker_tls_cert: Option<PathBuf>,

    #[arg(long)]
    pub docker_tls_key: Option<PathBuf>,

    /// Autonomous-mode polling interval, in seconds.
    #[arg(long, default_value_t = 6 * 60 * 60)]
    pub poll_interval_secs: u64,

    /// How long to tolerate disconnection before switching to autonomous mode, in seconds.
    #[arg(long, default_value_t = 5 * 60)]
    pub grace_period_offline_secs: u64,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}
