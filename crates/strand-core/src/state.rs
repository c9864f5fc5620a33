//! Task lifecycle and switch reasons

/// State of a task on a carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Context created, never switched into
    Created = 0,

    /// In the run queue
    Ready = 1,

    /// Currently executing on the carrier
    Running = 2,

    /// Entry routine returned; the stack may be reclaimed
    Finished = 3,
}

impl TaskState {
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, TaskState::Created | TaskState::Ready)
    }

    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, TaskState::Finished)
    }
}

/// Transfer value a task hands back to its carrier when it switches away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SwitchReason {
    /// Task called `yield_now` and is back in the run queue
    Yielded = 1,

    /// Task's entry routine returned; it must never be resumed
    Finished = 2,
}

impl SwitchReason {
    /// Decode a raw transfer value
    #[inline]
    pub const fn from_transfer(value: usize) -> Option<Self> {
        match value {
            1 => Some(SwitchReason::Yielded),
            2 => Some(SwitchReason::Finished),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_transfer(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(TaskState::Created.is_runnable());
        assert!(TaskState::Ready.is_runnable());
        assert!(!TaskState::Running.is_runnable());
        assert!(TaskState::Finished.is_terminated());
        assert!(!TaskState::Ready.is_terminated());
    }

    #[test]
    fn test_switch_reason_transfer() {
        assert_eq!(SwitchReason::from_transfer(SwitchReason::Yielded.as_transfer()), Some(SwitchReason::Yielded));
        assert_eq!(SwitchReason::from_transfer(2), Some(SwitchReason::Finished));
        assert_eq!(SwitchReason::from_transfer(0), None);
    }
}
