//! OS-level termination of script process groups
//!
//! Every script is spawned as the leader of its own process group, so a
//! signal sent to the group also reaches anything the script forked.

use tokio::process::Child;
use tracing::debug;

/// Ask the run's process group to exit
pub(crate) fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGTERM);
        return;
    }

    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.start_kill() {
        debug!("start_kill failed: {}", e);
    }
}

/// Forcefully end the run's process group and reap the leader
pub(crate) async fn kill(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGKILL);
    }

    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        debug!("kill failed: {}", e);
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        debug!(
            "kill(-{}, {}) failed: {}",
            pgid,
            signal,
            std::io::Error::last_os_error()
        );
    }
}
