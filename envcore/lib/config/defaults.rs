use std::time::Duration;

use crate::orchestration::LaunchMode;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default maximum number of containers that may be active at once.
pub const DEFAULT_MAX_CONCURRENT_CONTAINERS: usize = 10;

/// The default number of isolation boundary handles in the pool.
pub const DEFAULT_BOUNDARY_POOL_SIZE: u32 = 20;

/// The default interval between system-wide resource rollups.
pub const DEFAULT_RESOURCE_INTERVAL: Duration = Duration::from_secs(3);

/// The default interval between per-container monitor ticks.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// How long a graceful stop waits after `SIGTERM` before killing survivors.
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// The default pause between launching two items of one environment.
pub const DEFAULT_ITEM_LAUNCH_INTERVAL: Duration = Duration::from_millis(300);

/// The shortest period a periodic task ticks at.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// The default number of jobs run in parallel by the concurrent launch mode.
pub const DEFAULT_MAX_CONCURRENT_LAUNCHES: usize = 5;

/// The default batch size of the batched launch mode.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// The default offset between two jobs of the staggered launch mode.
pub const DEFAULT_STAGGER_INTERVAL: Duration = Duration::from_secs(2);

/// The default pause between two batches of the concurrent launch mode.
pub const DEFAULT_CONCURRENT_BATCH_PAUSE: Duration = Duration::from_secs(1);

/// The default pause between two batches of the batched launch mode.
pub const DEFAULT_BATCHED_BATCH_PAUSE: Duration = Duration::from_secs(2);

/// The launch mode used when a run does not name one.
pub const DEFAULT_LAUNCH_MODE: LaunchMode = LaunchMode::Concurrent;

/// Process names that are never signalled when a container stops.
///
/// These are session managers, desktop shells and compositors that a launched application may
/// be reparented under or may itself have started.
pub const PROTECTED_PROCESS_NAMES: &[&str] = &[
    "init",
    "systemd",
    "launchd",
    "kernel_task",
    "loginwindow",
    "windowserver",
    "dock",
    "finder",
    "gnome-shell",
    "gnome-session-binary",
    "plasmashell",
    "kwin_x11",
    "kwin_wayland",
    "xorg",
    "xwayland",
    "dbus-daemon",
    "explorer.exe",
    "dwm.exe",
    "winlogon.exe",
    "csrss.exe",
    "lsass.exe",
    "services.exe",
];
