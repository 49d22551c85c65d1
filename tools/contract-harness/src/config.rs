//! Contract harness configuration loaded from environment variables.

/// All configuration for the Docker-based contract harness.
///
/// Loaded from env vars after `dotenv::dotenv().ok()`; no CLI parsing.
/// All values have safe defaults suitable for local development.
#[derive(Debug)]
pub struct ContractHarnessConfig {
    /// Docker daemon URL used by the harness orchestrator to spin up the
    /// disposable Postgres container (`DOCKER_HOST`).
    /// default: `"unix:///var/run/docker.sock"`
    pub docker_host: String,

    /// First port candidate the pool's `PortAllocator` hands out
    /// (`CLUSTER_API_PORT_START`).
    /// default: `31000`
    pub cluster_api_port_start: u16,

    /// Path to the test composition template passed as `COMPOSE_FILE_PATH`.
    /// default: `"tools/contract-harness/fixtures/compose_template.json"`
    pub compose_file_path: String,

    /// Allowed `consensus_plugin` values (`CONSENSUS_PLUGINS`).
    pub consensus_plugins: Vec<String>,
    /// Allowed `consensus_mode` values (`CONSENSUS_MODES`).
    pub consensus_modes: Vec<String>,
    /// Allowed `size` values (`CLUSTER_SIZES`).
    pub cluster_sizes: Vec<i32>,
}

impl ContractHarnessConfig {
    pub fn from_env() -> Self {
        Self {
            docker_host: std::env::var("DOCKER_HOST")
                .unwrap_or_else(|_| "unix:///var/run/docker.sock".to_owned()),
            cluster_api_port_start: std::env::var("CLUSTER_API_PORT_START")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(31000),
            compose_file_path: std::env::var("COMPOSE_FILE_PATH").unwrap_or_else(|_| {
                "tools/contract-harness/fixtures/compose_template.json".to_owned()
            }),
            consensus_plugins: split_csv_env_or("CONSENSUS_PLUGINS", "solo,kafka,raft"),
            consensus_modes: split_csv_env_or("CONSENSUS_MODES", "solo,cluster"),
            cluster_sizes: split_csv_env_or("CLUSTER_SIZES", "1,4")
                .into_iter()
                .map(|s| s.parse().expect("CLUSTER_SIZES must be integers"))
                .collect(),
        }
    }
}

fn split_csv_env_or(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_owned())
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
