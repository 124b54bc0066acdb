//! Notifications broadcast by the orchestration core.
//!
//! Every component shares one [`EventBus`]. Events are fire-and-forget: emitting with no
//! subscribers is not an error, and a subscriber that falls behind loses the oldest events.

use tokio::sync::broadcast;

use crate::{
    orchestration::{LaunchResult, SystemResources},
    runtime::ContainerState,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The number of events buffered per subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An event emitted by a container, the manager or the launch scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvcoreEvent {
    /// A container finished starting.
    ContainerStarted(String),

    /// A container was stopped and deregistered.
    ContainerStopped(String),

    /// A container became the active one.
    ContainerSwitched(String),

    /// A container moved to a new lifecycle state.
    ContainerStateChanged {
        /// The container that changed.
        container_id: String,

        /// The state it moved to.
        state: ContainerState,
    },

    /// An application of a container was spawned.
    ItemSpawned {
        /// The container the item belongs to.
        container_id: String,

        /// The name of the application.
        item: String,

        /// The PID of the spawned process.
        pid: u32,
    },

    /// An application or website of a container failed to launch.
    ItemFailed {
        /// The container the item belongs to.
        container_id: String,

        /// The name of the item.
        item: String,

        /// Why it failed.
        error: String,
    },

    /// The periodic resource rollup produced a new snapshot.
    ResourcesUpdated(SystemResources),

    /// A start was refused because the registry is full.
    MaxContainersReached(usize),

    /// The scheduler began a launch job.
    LaunchStarted {
        /// The container being launched.
        container_id: String,

        /// The environment being launched.
        environment: String,
    },

    /// A launch job made progress.
    LaunchProgress {
        /// The container being launched.
        container_id: String,

        /// The progress of the job, from 0 to 100.
        percent: u8,

        /// A short description of the current step.
        status: String,
    },

    /// A launch job finished.
    LaunchCompleted {
        /// The container that was launched.
        container_id: String,

        /// Whether the launch succeeded.
        success: bool,
    },

    /// A batch of launch jobs started.
    BatchStarted {
        /// The position of the batch in the run, starting at 1.
        batch: usize,

        /// The number of jobs in the batch.
        size: usize,
    },

    /// A batch of launch jobs finished.
    BatchCompleted {
        /// The position of the batch in the run, starting at 1.
        batch: usize,

        /// The number of jobs that succeeded.
        succeeded: usize,

        /// The number of jobs that produced a result.
        total: usize,
    },

    /// A scheduler run finished.
    AllLaunchesCompleted(Vec<LaunchResult>),

    /// The number of queued launch jobs changed.
    QueueUpdated(usize),
}

/// A cloneable handle to the broadcast channel all events are sent on.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EnvcoreEvent>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EventBus {
    /// Creates a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns a receiver for every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EnvcoreEvent> {
        self.sender.subscribe()
    }

    /// Emits an event to the current subscribers.
    pub fn emit(&self, event: EnvcoreEvent) {
        tracing::trace!(?event, "emitting event");
        let _ = self.sender.send(event);
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(EnvcoreEvent::QueueUpdated(1));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() -> anyhow::Result<()> {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();

        bus.emit(EnvcoreEvent::ContainerStarted("dev-1".to_string()));
        bus.emit(EnvcoreEvent::MaxContainersReached(3));

        for rx in [&mut first, &mut second] {
            assert_eq!(
                rx.recv().await?,
                EnvcoreEvent::ContainerStarted("dev-1".to_string())
            );
            assert_eq!(rx.recv().await?, EnvcoreEvent::MaxContainersReached(3));
        }

        Ok(())
    }
}
