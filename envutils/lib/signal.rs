//! `envutils::signal` contains helpers for signalling processes by PID.

use nix::{
    sys::signal::{self, Signal},
    unistd::Pid,
};

use crate::{EnvutilsError, EnvutilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Asks a process to terminate with `SIGTERM`.
pub fn terminate(pid: u32) -> EnvutilsResult<()> {
    send_signal(pid, Signal::SIGTERM)
}

/// Kills a process with `SIGKILL`.
pub fn kill(pid: u32) -> EnvutilsResult<()> {
    send_signal(pid, Signal::SIGKILL)
}

/// Suspends a process with `SIGSTOP`.
pub fn suspend(pid: u32) -> EnvutilsResult<()> {
    send_signal(pid, Signal::SIGSTOP)
}

/// Resumes a suspended process with `SIGCONT`.
pub fn resume(pid: u32) -> EnvutilsResult<()> {
    send_signal(pid, Signal::SIGCONT)
}

/// Sends `sig` to the process `pid`.
pub fn send_signal(pid: u32, sig: Signal) -> EnvutilsResult<()> {
    let target = to_pid(pid)?;
    signal::kill(target, sig).map_err(|source| EnvutilsError::Signal {
        pid,
        signal: sig.as_str(),
        source,
    })
}

/// Pid 0 and anything above `i32::MAX` would address process groups, never a single process.
fn to_pid(pid: u32) -> EnvutilsResult<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
        _ => Err(EnvutilsError::InvalidPid(pid)),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
