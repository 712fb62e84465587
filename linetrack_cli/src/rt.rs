//! Real-time scheduling for the control loop (Linux: SCHED_FIFO, affinity, mlockall).
//!
//! Every step is best-effort: a refusal is logged and the run continues with
//! normal scheduling.

use crate::cli::{RtArgs, RtLock};

#[cfg(target_os = "linux")]
/// Capacity of cpu_set_t in CPU indices (bits).
const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

/// Apply the requested real-time settings once per process.
pub fn setup_rt_once(args: &RtArgs) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| apply(lock, args.rt_prio, args.rt_cpu));
}

#[cfg(target_os = "linux")]
fn apply(lock: RtLock, prio: Option<i32>, cpu: Option<usize>) {
    match lock_memory(lock) {
        Ok(()) => tracing::info!(mode = ?lock, "rt: memory lock applied"),
        Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
    }
    match fifo_priority(prio) {
        Ok(p) => tracing::info!(priority = p, "rt: SCHED_FIFO applied"),
        Err(e) => tracing::warn!(error = %e, "rt: sched_setscheduler failed"),
    }
    match pin_cpu(cpu.unwrap_or(0)) {
        Ok(c) => tracing::info!(cpu = c, "rt: affinity applied"),
        Err(e) => tracing::warn!(error = %e, "rt: affinity not applied"),
    }
}

#[cfg(not(target_os = "linux"))]
fn apply(_lock: RtLock, _prio: Option<i32>, _cpu: Option<usize>) {
    tracing::warn!("rt: real-time mode is only supported on Linux; ignoring --rt");
}

#[cfg(target_os = "linux")]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    fn mlock(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: mlockall takes no pointers; failure is reported via errno.
        if unsafe { mlockall(flags) } != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => MCL_CURRENT,
        RtLock::All => MCL_CURRENT | MCL_FUTURE,
    };
    let Err(err) = mlock(flags) else {
        return Ok(());
    };
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);
    // Locking future pages is the first thing a tight memlock limit refuses.
    if lock == RtLock::All && retryable && mlock(MCL_CURRENT).is_ok() {
        tracing::warn!("rt: mlockall(current|future) refused; locked current pages only");
        return Ok(());
    }
    let mut msg = format!("mlockall({lock:?}) failed: {err}");
    if retryable {
        if let Some(limit) = memlock_limit_kib() {
            msg.push_str(&format!("; memlock limit: {limit}"));
        }
        msg.push_str("; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(target_os = "linux")]
fn memlock_limit_kib() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit on success; we only read it then.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let r = unsafe { rlim.assume_init() };
    Some(if r.rlim_cur == libc::RLIM_INFINITY {
        "unlimited".to_string()
    } else {
        format!("{} KiB", r.rlim_cur / 1024)
    })
}

#[cfg(target_os = "linux")]
fn fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    // SAFETY: plain queries with no pointer arguments.
    let (min, max) = unsafe {
        (
            sched_get_priority_min(SCHED_FIFO),
            sched_get_priority_max(SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let wanted = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: wanted,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling process.
    if unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) } != 0 {
        let err = std::io::Error::last_os_error();
        eyre::bail!(
            "SCHED_FIFO priority {wanted}: {err}; hint: run as root or 'sudo setcap cap_sys_nice=ep /path/to/linetrack'"
        );
    }
    Ok(wanted)
}

#[cfg(target_os = "linux")]
fn pin_cpu(target: usize) -> eyre::Result<usize> {
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO, cpu_set_t};

    // SAFETY: sysconf has no memory-safety preconditions.
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online < 1 {
        eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
    }
    if target as libc::c_long >= online {
        eyre::bail!("requested CPU {target} >= online {online}");
    }
    if target >= MAX_CPUSET_BITS {
        eyre::bail!("requested CPU {target} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
    }

    let size = std::mem::size_of::<cpu_set_t>();
    // SAFETY: cpu_set_t is a plain bitmask; all-zero is a valid empty set and
    // both syscalls are given its exact size.
    unsafe {
        let mut allowed: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut allowed);
        if libc::sched_getaffinity(0, size, &mut allowed) == 0 && !CPU_ISSET(target, &allowed) {
            eyre::bail!("CPU {target} not permitted by current affinity mask");
        }
        let mut desired: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut desired);
        CPU_SET(target, &mut desired);
        if libc::sched_setaffinity(0, size, &desired) != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
    }
    Ok(target)
}
