//! Port probing and stale-process termination.

use std::process::Command;

use ici_chat::shutdown;

#[test]
fn bound_port_is_in_use_until_dropped() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    assert!(shutdown::is_port_in_use(port));
    drop(listener);
    assert!(!shutdown::is_port_in_use(port));
}

#[cfg(target_os = "linux")]
#[test]
fn our_own_listener_is_never_a_cleanup_target() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    assert!(!shutdown::find_processes_on_port(port).contains(&std::process::id()));
}

#[tokio::test]
async fn free_port_needs_no_cleanup() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    shutdown::prepare_for_startup(port).await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn terminate_stops_a_child_process() {
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id();
    // Reap the child as soon as it exits so it doesn't linger as a zombie.
    let reaper = std::thread::spawn(move || child.wait());

    assert!(shutdown::terminate_process(pid, false).await);
    let status = reaper.join().unwrap().unwrap();
    assert!(!status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn terminating_a_missing_pid_reports_gone() {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    assert!(shutdown::terminate_process(pid, true).await);
}
