use std::collections::HashSet;

use crate::error::PoolError;

/// Ports at or above this many used-port entries refuse further allocation.
const MAX_USED_PORTS: usize = 64_000;

/// Parsed `tcp://<ip>:<port>` daemon URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAddr {
    pub ip: String,
    pub port: u16,
}

/// Parse a daemon URL of the form `tcp://<ip>:<port>`.
///
/// Exactly three colon-separated segments after splitting are required; the
/// ip is the second segment with its leading `//` stripped.
pub fn parse_daemon_url(daemon_url: &str) -> Result<DaemonAddr, PoolError> {
    let segments: Vec<&str> = daemon_url.split(':').collect();
    let [scheme, host_part, port_part] = segments.as_slice() else {
        return Err(PoolError::InvalidInput(format!(
            "daemon url must have exactly 3 colon-separated segments: {daemon_url}"
        )));
    };
    if *scheme != "tcp" {
        return Err(PoolError::InvalidInput(format!(
            "unsupported daemon url scheme: {daemon_url}"
        )));
    }
    let ip = host_part
        .strip_prefix("//")
        .ok_or_else(|| PoolError::InvalidInput(format!("malformed daemon url: {daemon_url}")))?;
    let port: u16 = port_part
        .parse()
        .map_err(|_| PoolError::InvalidInput(format!("malformed daemon port: {daemon_url}")))?;
    Ok(DaemonAddr {
        ip: ip.to_owned(),
        port,
    })
}

/// Allocate the first `n` ports from `start` that are not in `used`.
///
/// The search window is `used.len() + n` candidates, so success is
/// guaranteed unless the used-port count would reach [`MAX_USED_PORTS`].
/// `n == 0` returns empty immediately, before the threshold check.
pub fn allocate_ports(start: u16, used: &HashSet<u16>, n: usize) -> Result<Vec<u16>, PoolError> {
    if n == 0 {
        return Ok(Vec::new());
    }
    if used.len() + n >= MAX_USED_PORTS {
        return Err(PoolError::InvalidInput(
            "no free ports remain in the allocation range".to_owned(),
        ));
    }

    let window = used.len() + n;
    let mut free = Vec::with_capacity(n);
    let mut candidate = start as u32;
    for _ in 0..window {
        if free.len() == n {
            break;
        }
        if candidate > u16::MAX as u32 {
            break;
        }
        let port = candidate as u16;
        if !used.contains(&port) {
            free.push(port);
        }
        candidate += 1;
    }

    if free.len() < n {
        return Err(PoolError::InvalidInput(
            "exhausted search window before finding enough free ports".to_owned(),
        ));
    }
    Ok(free)
}

/// Single-port allocation, honoring an explicit caller-supplied port
/// verbatim with no collision check — the engine trusts the operator here.
pub fn allocate_one(
    start: u16,
    used: &HashSet<u16>,
    explicit: Option<u16>,
) -> Result<u16, PoolError> {
    if let Some(port) = explicit.filter(|p| *p > 0) {
        return Ok(port);
    }
    Ok(allocate_ports(start, used, 1)?[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_valid_daemon_url() {
        let addr = parse_daemon_url("tcp://10.0.0.5:2376").unwrap();
        assert_eq!(addr.ip, "10.0.0.5");
        assert_eq!(addr.port, 2376);
    }

    #[test]
    fn should_reject_url_with_wrong_segment_count() {
        assert!(parse_daemon_url("tcp://10.0.0.5").is_err());
        assert!(parse_daemon_url("tcp://10.0.0.5:2376:extra").is_err());
    }

    #[test]
    fn should_allocate_zero_ports_without_checking_threshold() {
        let used = HashSet::new();
        assert_eq!(allocate_ports(30000, &used, 0).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn should_skip_used_ports_in_order() {
        let mut used = HashSet::new();
        used.insert(30000);
        used.insert(30001);
        let free = allocate_ports(30000, &used, 2).unwrap();
        assert_eq!(free, vec![30002, 30003]);
    }

    #[test]
    fn should_fail_when_used_plus_n_exceeds_max() {
        let used: HashSet<u16> = (0..63999).collect();
        assert!(allocate_ports(0, &used, 2).is_err());
    }

    #[test]
    fn should_honor_explicit_port_verbatim() {
        let used = HashSet::new();
        assert_eq!(allocate_one(30000, &used, Some(9999)).unwrap(), 9999);
    }

    #[test]
    fn should_ignore_explicit_port_zero() {
        let used = HashSet::new();
        assert_eq!(allocate_one(30000, &used, Some(0)).unwrap(), 30000);
    }
}
