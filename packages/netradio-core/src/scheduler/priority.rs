//! CPU placement and priority for the dedicated execution contexts.
//!
//! - **Linux**: pins with `sched_setaffinity` and applies the configured nice
//!   level via `setpriority` on the thread id. Negative levels need
//!   `CAP_SYS_NICE`.
//! - **macOS**: no affinity API. Elevation tries `SCHED_RR`, then the process
//!   nice level.
//! - **Other Unix**: process nice level only.
//!
//! Every failure here is logged and ignored. The device keeps working on an
//! unpinned, normal-priority thread.

use std::io;

/// Applies an optional core pin to the current thread and logs the outcome.
pub(crate) fn apply_core_placement(context: &str, core: Option<usize>) {
    let Some(core) = core else {
        log::debug!("[Scheduler] {} context is not pinned", context);
        return;
    };

    match pin_current_thread(core) {
        Ok(()) => log::info!("[Scheduler] {} context pinned to core {}", context, core),
        Err(e) => log::warn!(
            "[Scheduler] Failed to pin {} context to core {}: {}",
            context,
            core,
            e
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Core Affinity
// ─────────────────────────────────────────────────────────────────────────────

/// Restricts the current thread to a single CPU core.
#[cfg(target_os = "linux")]
pub(crate) fn pin_current_thread(core: usize) -> io::Result<()> {
    if core >= libc::CPU_SETSIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core {} is outside the CPU set", core),
        ));
    }

    // SAFETY: cpu_set_t is plain data and CPU_SET stays within it (checked
    // above). sched_setaffinity with pid 0 targets the calling thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn pin_current_thread(core: usize) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("thread affinity is not supported on this platform (core {})", core),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Thread Priority Elevation
// ─────────────────────────────────────────────────────────────────────────────

/// Applies the configured nice level to the current (audio) thread.
///
/// A level of 0 leaves the thread at normal priority.
pub(crate) fn raise_thread_priority(nice: i32) {
    if nice == 0 {
        log::debug!("[Scheduler] Audio thread runs at normal priority");
        return;
    }

    #[cfg(target_os = "linux")]
    set_audio_nice_linux(nice);

    #[cfg(target_os = "macos")]
    set_audio_priority_macos(nice);

    #[cfg(all(unix, not(any(target_os = "linux", target_os = "macos"))))]
    report_nice_result(set_process_nice(nice), nice);

    #[cfg(not(unix))]
    log::debug!(
        "[Scheduler] Nice {} ignored, no priority control on this platform",
        nice
    );
}

/// Linux applies `setpriority` to a single thread when given its tid.
#[cfg(target_os = "linux")]
fn set_audio_nice_linux(nice: i32) {
    // SAFETY: gettid has no preconditions and setpriority only reads its
    // arguments.
    let (tid, result) = unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        (tid, libc::setpriority(libc::PRIO_PROCESS, tid, nice))
    };

    if result == 0 {
        log::info!("[Scheduler] Audio thread {} set to nice {}", tid, nice);
    } else {
        log::warn!(
            "[Scheduler] Audio thread {} stays at default priority, nice {} refused: {}",
            tid,
            nice,
            io::Error::last_os_error()
        );
    }
}

/// macOS has no per-thread nice. Only an elevation asks for the round-robin
/// class, and a refusal there falls back to the process nice level.
#[cfg(target_os = "macos")]
fn set_audio_priority_macos(nice: i32) {
    if nice < 0 {
        // SAFETY: sched_param is plain data; pthread_self is always valid.
        let result = unsafe {
            let mut param: libc::sched_param = std::mem::zeroed();
            param.sched_priority = MACOS_AUDIO_RR_PRIORITY;
            libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param)
        };

        if result == 0 {
            log::info!(
                "[Scheduler] Audio thread set to SCHED_RR:{}",
                MACOS_AUDIO_RR_PRIORITY
            );
            return;
        }
        log::debug!(
            "[Scheduler] SCHED_RR refused ({}), using process nice",
            io::Error::from_raw_os_error(result)
        );
    }

    report_nice_result(set_process_nice(nice), nice);
}

/// Round-robin priority for the audio thread on macOS (range 1-99).
#[cfg(target_os = "macos")]
const MACOS_AUDIO_RR_PRIORITY: libc::c_int = 47;

#[cfg(all(unix, not(target_os = "linux")))]
fn set_process_nice(nice: i32) -> io::Result<()> {
    // SAFETY: setpriority only reads its arguments; who = 0 is the caller.
    if unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn report_nice_result(result: io::Result<()>, nice: i32) {
    match result {
        Ok(()) => log::info!("[Scheduler] Process set to nice {} for audio", nice),
        Err(e) => log::warn!("[Scheduler] Nice {} refused: {}", nice, e),
    }
}
