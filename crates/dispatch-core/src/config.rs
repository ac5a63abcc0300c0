//! Layered configuration for the dispatch agents, submitter and reporter.
//!
//! Defaults mirror the original tool's `config_defaults` mapping. A TOML file is the
//! primary source; any field can be overridden by an uppercase environment variable of
//! the same name, which is how the original deployment scripts injected per-cluster
//! overrides without templating the file itself.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_security_protocol")]
    pub kafka_security_protocol: String,
    #[serde(default)]
    pub kafka_sasl_mechanism: Option<String>,
    #[serde(default)]
    pub kafka_username: Option<String>,
    #[serde(default)]
    pub kafka_password: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: f64,

    #[serde(default = "default_worker_max_workers")]
    pub worker_agent_max_workers: usize,
    #[serde(default = "default_worker_job_timeout")]
    pub worker_job_timeout: u64,

    #[serde(default)]
    pub slurm_partition: Option<String>,
    #[serde(default = "default_slurm_job_type")]
    pub slurm_job_type: String,
    #[serde(default = "default_slurm_resources_required")]
    pub slurm_resources_required: u32,
    #[serde(default = "default_slurm_out_dir")]
    pub slurm_out_dir: String,

    #[serde(default = "default_shared_tmp")]
    pub shared_tmp: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    #[serde(default)]
    pub monitor_agent_url: Option<String>,
    #[serde(default = "default_monitor_context_path")]
    pub monitor_agent_context_path: String,

    #[serde(default)]
    pub cluster_agent_new_group: Option<String>,

    #[serde(default = "default_topic_new")]
    pub topic_new: String,
    #[serde(default = "default_topic_status")]
    pub topic_status: String,
    #[serde(default = "default_topic_done")]
    pub topic_done: String,
    #[serde(default = "default_topic_error")]
    pub topic_error: String,
    #[serde(default = "default_topic_heartbeat")]
    pub topic_heartbeat: String,

    #[serde(default)]
    pub debug: bool,
}

fn default_cluster_name() -> String {
    "my_cluster".to_string()
}
fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}
fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}
fn default_poll_interval() -> f64 {
    30.0
}
fn default_heartbeat_interval() -> f64 {
    0.0
}
fn default_worker_max_workers() -> usize {
    2
}
fn default_worker_job_timeout() -> u64 {
    86_400
}
fn default_slurm_job_type() -> String {
    "cpu".to_string()
}
fn default_slurm_resources_required() -> u32 {
    1
}
fn default_slurm_out_dir() -> String {
    "/tmp".to_string()
}
fn default_shared_tmp() -> String {
    "/tmp".to_string()
}
fn default_logs_dir() -> String {
    "/tmp".to_string()
}
fn default_monitor_context_path() -> String {
    "/".to_string()
}
fn default_topic_new() -> String {
    "new".to_string()
}
fn default_topic_status() -> String {
    "status".to_string()
}
fn default_topic_done() -> String {
    "done".to_string()
}
fn default_topic_error() -> String {
    "error".to_string()
}
fn default_topic_heartbeat() -> String {
    "heartbeat".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty document populates all defaults")
    }
}

impl DispatchConfig {
    /// Load from a TOML file, applying defaults for anything absent.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DispatchConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration the way the agents' entrypoints do: an explicit
    /// `DISPATCH_CONFIG` path takes precedence, then a short list of conventional
    /// locations, falling back to pure defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = if let Ok(path) = std::env::var("DISPATCH_CONFIG") {
            Self::load(Path::new(&path))?
        } else {
            Self::default_search_path()?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn default_search_path() -> Result<Self> {
        for candidate in [
            "./dispatch.toml",
            "./config/dispatch.toml",
            "/etc/dispatch-bus/dispatch.toml",
        ] {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load(path);
            }
        }
        Ok(Self::default())
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! override_string {
            ($field:ident, $env:literal) => {
                if let Ok(value) = std::env::var($env) {
                    self.$field = value;
                }
            };
        }
        macro_rules! override_parsed {
            ($field:ident, $env:literal) => {
                if let Ok(value) = std::env::var($env) {
                    if let Ok(parsed) = value.parse() {
                        self.$field = parsed;
                    }
                }
            };
        }

        override_string!(cluster_name, "CLUSTER_NAME");
        override_string!(bootstrap_servers, "BOOTSTRAP_SERVERS");
        override_string!(kafka_security_protocol, "KAFKA_SECURITY_PROTOCOL");
        override_parsed!(poll_interval, "POLL_INTERVAL");
        override_parsed!(heartbeat_interval, "HEARTBEAT_INTERVAL");
        override_parsed!(worker_agent_max_workers, "WORKER_AGENT_MAX_WORKERS");
        override_parsed!(worker_job_timeout, "WORKER_JOB_TIMEOUT");
        override_string!(slurm_job_type, "SLURM_JOB_TYPE");
        override_parsed!(slurm_resources_required, "SLURM_RESOURCES_REQUIRED");
        override_string!(slurm_out_dir, "SLURM_OUT_DIR");
        override_string!(shared_tmp, "SHARED_TMP");
        override_string!(logs_dir, "LOGS_DIR");
        override_string!(monitor_agent_context_path, "MONITOR_AGENT_CONTEXT_PATH");

        if let Ok(value) = std::env::var("KAFKA_SASL_MECHANISM") {
            self.kafka_sasl_mechanism = Some(value);
        }
        if let Ok(value) = std::env::var("KAFKA_USERNAME") {
            self.kafka_username = Some(value);
        }
        if let Ok(value) = std::env::var("KAFKA_PASSWORD") {
            self.kafka_password = Some(value);
        }
        if let Ok(value) = std::env::var("SLURM_PARTITION") {
            self.slurm_partition = Some(value);
        }
        if let Ok(value) = std::env::var("MONITOR_AGENT_URL") {
            self.monitor_agent_url = Some(value);
        }
        if let Ok(value) = std::env::var("CLUSTER_AGENT_NEW_GROUP") {
            self.cluster_agent_new_group = Some(value);
        }
        if let Ok(value) = std::env::var("DEBUG") {
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
    }

    fn validate(&self) -> Result<()> {
        if self.worker_agent_max_workers == 0 {
            return Err(DispatchError::Config(
                "WORKER_AGENT_MAX_WORKERS must be at least 1".to_string(),
            ));
        }
        if self.slurm_resources_required == 0 {
            return Err(DispatchError::Config(
                "SLURM_RESOURCES_REQUIRED must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The consumer group the dispatch agents subscribe to `topic_new` with,
    /// defaulting to a name derived from the cluster identity.
    pub fn new_group(&self) -> String {
        self.cluster_agent_new_group
            .clone()
            .unwrap_or_else(|| format!("{}_new_group", self.cluster_name))
    }

    /// `true` iff the heartbeat interval is configured to anything but the
    /// disabling sentinel of `0`.
    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat_interval > 0.0
    }

    /// Client id shared across producers for a given role (`worker`, `cluster`, ...).
    pub fn client_id(&self, role: &str) -> String {
        format!("{}_{}", self.cluster_name, role)
    }
}
