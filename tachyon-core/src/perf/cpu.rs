//! CPU Affinity and Thread Priority Utilities
//!
//! The decision thread wants an isolated core and high priority; the log
//! drainer wants the opposite (a far core, reduced priority) so it never
//! competes with the hot path.

use anyhow::Result;
use core_affinity::CoreId;

/// Pin the current thread to a specific CPU core
///
/// # Example
/// ```no_run
/// use tachyon_core::perf::cpu::pin_to_core;
/// pin_to_core(2).expect("Failed to pin to core 2");
/// ```
pub fn pin_to_core(core: usize) -> Result<()> {
    let core_id = CoreId { id: core };

    if core_affinity::set_for_current(core_id) {
        tracing::info!("Pinned thread to CPU core {}", core);
        Ok(())
    } else {
        anyhow::bail!("Failed to pin thread to core {}", core)
    }
}

/// Pin the current thread to the highest-numbered core
pub fn pin_to_last_core() -> Result<usize> {
    let last = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().map(|c| c.id).max())
        .ok_or_else(|| anyhow::anyhow!("Core ids unavailable on this platform"))?;
    pin_to_core(last)?;
    Ok(last)
}

/// Set real-time thread priority (Linux only)
///
/// Requires CAP_SYS_NICE capability or root privileges.
#[cfg(target_os = "linux")]
pub fn set_realtime_priority(priority: i32) -> Result<()> {
    use libc::{sched_param, sched_setscheduler, SCHED_FIFO};

    let param = sched_param {
        sched_priority: priority,
    };

    // SAFETY: pid 0 targets the calling thread; `param` outlives the call
    if unsafe { sched_setscheduler(0, SCHED_FIFO, &param) } == 0 {
        tracing::info!("Set thread priority to SCHED_FIFO:{}", priority);
        Ok(())
    } else {
        anyhow::bail!("Failed to set thread priority (may need CAP_SYS_NICE or root)")
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_realtime_priority(_priority: i32) -> Result<()> {
    tracing::warn!("Real-time priority setting not supported on this platform");
    Ok(())
}

/// Raise the nice value of the calling thread (Linux only)
///
/// Positive values lower priority; unprivileged callers may always do that.
#[cfg(target_os = "linux")]
pub fn lower_current_thread_priority(nice: i32) -> Result<()> {
    // SAFETY: plain syscalls on the calling thread's own id
    let result = unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        libc::setpriority(libc::PRIO_PROCESS, tid, nice)
    };

    if result == 0 {
        tracing::debug!("Lowered thread priority to nice {}", nice);
        Ok(())
    } else {
        anyhow::bail!(
            "Failed to set nice {}: {}",
            nice,
            std::io::Error::last_os_error()
        )
    }
}

#[cfg(not(target_os = "linux"))]
pub fn lower_current_thread_priority(_nice: i32) -> Result<()> {
    tracing::debug!("Thread nice values not supported on this platform");
    Ok(())
}

/// Get the number of available CPU cores
pub fn num_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
}

/// Pin and prioritize the decision thread
pub fn optimize_for_hft(core: usize, priority: i32) -> Result<()> {
    pin_to_core(core)?;
    set_realtime_priority(priority)?;

    tracing::info!("Thread optimized for HFT: core={}, priority={}", core, priority);
    Ok(())
}
