//! Port cleanup before startup and signal handling for graceful exit.
//!
//! A dev server killed uncleanly can leave a listener holding the port.
//! Before binding we look for other processes listening on it and ask them
//! to exit, escalating to SIGKILL when they don't.

use std::net::TcpListener;
use std::time::Duration;

use crate::error::IciError;

/// How long a terminated process gets before SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
/// Extra wait after SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(2);
/// Pause after cleanup so the kernel releases the socket.
const RELEASE_WAIT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// TCP state code for LISTEN in `/proc/net/tcp`.
const TCP_LISTEN: &str = "0A";

pub fn is_port_in_use(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_err()
}

/// Socket inodes listening on `port`, from the contents of
/// `/proc/net/tcp` or `/proc/net/tcp6`.
pub fn parse_listen_inodes(proc_net_tcp: &str, port: u16) -> Vec<u64> {
    proc_net_tcp
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                return None;
            }
            let (_, port_hex) = fields[1].rsplit_once(':')?;
            let local_port = u16::from_str_radix(port_hex, 16).ok()?;
            if local_port != port {
                return None;
            }
            fields[9].parse::<u64>().ok().filter(|inode| *inode != 0)
        })
        .collect()
}

/// PIDs (other than ours) holding a listening socket on `port`. Only
/// implemented on Linux; elsewhere nothing is found.
pub fn find_processes_on_port(port: u16) -> Vec<u32> {
    if !cfg!(target_os = "linux") {
        return Vec::new();
    }
    let mut inodes = Vec::new();
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(contents) = std::fs::read_to_string(table) {
            inodes.extend(parse_listen_inodes(&contents, port));
        }
    }
    if inodes.is_empty() {
        return Vec::new();
    }
    let targets: Vec<String> = inodes.iter().map(|i| format!("socket:[{i}]")).collect();
    let me = std::process::id();

    let Ok(procs) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    let mut pids: Vec<u32> = procs
        .flatten()
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| *pid != me)
        .filter(|pid| {
            let Ok(fds) = std::fs::read_dir(format!("/proc/{pid}/fd")) else {
                return false;
            };
            fds.flatten().any(|fd| {
                std::fs::read_link(fd.path())
                    .map(|link| targets.iter().any(|t| link.as_os_str() == t.as_str()))
                    .unwrap_or(false)
            })
        })
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, signal) == 0 }
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    send_signal(pid, 0)
}

#[cfg(unix)]
async fn wait_for_exit(pid: u32, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    !is_alive(pid)
}

/// Stop `pid` with SIGTERM (SIGKILL when `force`), escalating to SIGKILL
/// after a grace period. Returns whether the process is gone.
#[cfg(unix)]
pub async fn terminate_process(pid: u32, force: bool) -> bool {
    let first = if force { libc::SIGKILL } else { libc::SIGTERM };
    if !send_signal(pid, first) {
        // Already gone, or not ours to signal.
        return !is_alive(pid);
    }
    tracing::info!("shutdown: sent {} to pid {pid}", if force { "SIGKILL" } else { "SIGTERM" });
    if wait_for_exit(pid, TERMINATE_GRACE).await {
        return true;
    }
    if force {
        return false;
    }
    tracing::warn!("shutdown: pid {pid} ignored SIGTERM, sending SIGKILL");
    send_signal(pid, libc::SIGKILL);
    wait_for_exit(pid, KILL_GRACE).await
}

#[cfg(not(unix))]
pub async fn terminate_process(_pid: u32, _force: bool) -> bool {
    false
}

/// Make sure `port` is free before binding, terminating stale holders.
pub async fn prepare_for_startup(port: u16) -> Result<(), IciError> {
    if !is_port_in_use(port) {
        return Ok(());
    }
    let pids = find_processes_on_port(port);
    tracing::warn!("shutdown: port {port} busy, holders: {pids:?}");
    for pid in pids {
        if !terminate_process(pid, false).await {
            tracing::warn!("shutdown: could not stop pid {pid}");
        }
    }
    tokio::time::sleep(RELEASE_WAIT).await;
    if is_port_in_use(port) {
        return Err(IciError::PortInUse(port));
    }
    tracing::info!("shutdown: port {port} released");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("shutdown: ctrl-c handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("shutdown: SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("shutdown: ctrl-c received"),
        _ = terminate => tracing::info!("shutdown: SIGTERM received"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 424242 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F90 0100007F:D431 01 00000000:00000000 00:00000000 00000000  1000        0 515151 1 0000000000000000 20 4 30 10 -1
   2: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 99 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn only_listening_sockets_on_the_port_match() {
        assert_eq!(parse_listen_inodes(SAMPLE, 8080), vec![424242]);
        assert_eq!(parse_listen_inodes(SAMPLE, 22), vec![99]);
        assert!(parse_listen_inodes(SAMPLE, 9999).is_empty());
    }

    #[test]
    fn garbage_lines_are_skipped() {
        assert!(parse_listen_inodes("header\nnot a socket line\n", 8080).is_empty());
    }
}
