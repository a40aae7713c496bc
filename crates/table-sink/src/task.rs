use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Canceled,
    Failed,
    Finished,
}

impl TaskState {
    fn as_u8(self) -> u8 {
        match self {
            TaskState::Running => 0,
            TaskState::Canceled => 1,
            TaskState::Failed => 2,
            TaskState::Finished => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Running,
            1 => TaskState::Canceled,
            2 => TaskState::Failed,
            _ => TaskState::Finished,
        }
    }
}

/// Reports the lifecycle state of the task that owns a sink. Consulted on
/// close to decide whether buffered rows may still be committed.
pub trait TaskStateProvider: Send + Sync {
    fn state(&self) -> TaskState;

    fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }
}

/// Shared, settable task state.
#[derive(Debug, Clone)]
pub struct TaskStateCell {
    state: Arc<AtomicU8>,
}

impl TaskStateCell {
    pub fn new(state: TaskState) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(state.as_u8())),
        }
    }

    pub fn set(&self, state: TaskState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

impl Default for TaskStateCell {
    fn default() -> Self {
        Self::new(TaskState::Running)
    }
}

impl TaskStateProvider for TaskStateCell {
    fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }
}
