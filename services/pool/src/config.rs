/// Pool service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// PostgreSQL connection URL, backing both `active`/`released` clusters
    /// and the host registry.
    pub database_url: String,
    /// First port candidate the allocator hands out.
    pub cluster_api_port_start: u16,
    /// Path to the backend composition template.
    pub compose_file_path: String,
    /// Allowed `consensus_plugin` values; anything else is rejected at the
    /// facade.
    pub consensus_plugins: Vec<String>,
    /// Allowed `consensus_mode` values.
    pub consensus_modes: Vec<String>,
    /// Allowed `size` values.
    pub cluster_sizes: Vec<i32>,
    /// TCP port to listen on (default 3113). Env var: `POOL_PORT`.
    pub pool_port: u16,
    /// Per-call timeout for Docker daemon connections. Env var:
    /// `DOCKER_CONNECT_TIMEOUT_SECS` (default 30).
    pub docker_connect_timeout_secs: u64,
}

impl PoolConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            cluster_api_port_start: std::env::var("CLUSTER_API_PORT_START")
                .expect("CLUSTER_API_PORT_START")
                .parse()
                .expect("CLUSTER_API_PORT_START must be a u16"),
            compose_file_path: std::env::var("COMPOSE_FILE_PATH").expect("COMPOSE_FILE_PATH"),
            consensus_plugins: split_csv_env("CONSENSUS_PLUGINS"),
            consensus_modes: split_csv_env("CONSENSUS_MODES"),
            cluster_sizes: split_csv_env("CLUSTER_SIZES")
                .into_iter()
                .map(|s| s.parse().expect("CLUSTER_SIZES must be integers"))
                .collect(),
            pool_port: std::env::var("POOL_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3113),
            docker_connect_timeout_secs: std::env::var("DOCKER_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

fn split_csv_env(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| panic!("{key}"))
        .split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_split_csv_env_trimming_whitespace() {
        // SAFETY: test-only, single-threaded access to this env var name.
        unsafe {
            std::env::set_var("TEST_CSV_ENV", "raft, kafka ,solo");
        }
        assert_eq!(split_csv_env("TEST_CSV_ENV"), vec!["raft", "kafka", "solo"]);
        unsafe {
            std::env::remove_var("TEST_CSV_ENV");
        }
    }
}
