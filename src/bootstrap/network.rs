//! Network reachability probe.
//!
//! Uses `TcpStream::connect_timeout` rather than ICMP: ping is often blocked
//! inside WSL's NAT and would require shelling out. Each host gets one
//! deadline covering name resolution and every resolved address; the first
//! successful connect wins.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub trait NetworkProbe {
    fn is_reachable(&self) -> bool;
}

/// TCP connect probe over a fixed host list.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    hosts: Vec<String>,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(hosts: Vec<String>, timeout: Duration) -> Self {
        Self { hosts, timeout }
    }

    fn try_host(&self, host: &str) -> bool {
        let deadline = Instant::now() + self.timeout;
        match resolve(host, deadline) {
            Some(addrs) => connect_any(host, &addrs, deadline),
            None => false,
        }
    }
}

/// Literal addresses skip DNS. Names are looked up on a helper thread so a
/// hung resolver cannot outlast the deadline; the thread is left to finish
/// on its own.
fn resolve(host: &str, deadline: Instant) -> Option<Vec<SocketAddr>> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Some(vec![addr]);
    }

    let (tx, rx) = mpsc::channel();
    let name = host.to_string();
    let spawned = std::thread::Builder::new()
        .name("oobe-resolve".into())
        .spawn(move || {
            let _ = tx.send(name.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>()));
        });
    if let Err(e) = spawned {
        debug!(host, error = %e, "could not start resolver thread");
        return None;
    }

    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(Ok(addrs)) => Some(addrs),
        Ok(Err(e)) => {
            debug!(host, error = %e, "name resolution failed");
            None
        }
        Err(_) => {
            debug!(host, "name resolution timed out");
            None
        }
    }
}

/// Try each address with whatever time is left before `deadline`.
fn connect_any(host: &str, addrs: &[SocketAddr], deadline: Instant) -> bool {
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(host, "probe deadline reached");
            return false;
        }
        match TcpStream::connect_timeout(addr, remaining) {
            Ok(_stream) => return true,
            Err(e) => debug!(host, %addr, error = %e, "connect failed"),
        }
    }
    false
}

impl NetworkProbe for TcpProbe {
    fn is_reachable(&self) -> bool {
        match self.hosts.iter().find(|host| self.try_host(host)) {
            Some(host) => {
                info!(host = %host, "network reachable");
                true
            }
            None => {
                warn!(hosts = ?self.hosts, "no probe host reachable");
                false
            }
        }
    }
}
