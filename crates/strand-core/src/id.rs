//! Task identifier type

use core::fmt;

use crate::constants::TASK_NONE;

/// Identifier of a task running on a carrier
///
/// Indexes the carrier's handle table, so ids are only meaningful on the
/// carrier that issued them. `u32::MAX` is reserved for "no task".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TaskId(u32);

impl TaskId {
    /// Sentinel value indicating no task
    pub const NONE: TaskId = TaskId(TASK_NONE);

    #[inline]
    pub const fn new(id: u32) -> Self {
        TaskId(id)
    }

    /// Build an id from a handle-table index, `None` if it would collide
    /// with the sentinel
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index)
            .ok()
            .filter(|&raw| raw != TASK_NONE)
            .map(TaskId)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == TASK_NONE
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != TASK_NONE
    }

    #[inline]
    pub const fn to_option(self) -> Option<TaskId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for TaskId {
    #[inline]
    fn from(id: u32) -> Self {
        TaskId(id)
    }
}

impl From<TaskId> for u32 {
    #[inline]
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "TaskId(NONE)")
        } else {
            write!(f, "TaskId({})", self.0)
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for TaskId {
    fn default() -> Self {
        TaskId::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_basics() {
        let id = TaskId::new(42);
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.as_usize(), 42);
        assert!(id.is_some());
        assert_eq!(format!("{}", id), "42");
    }

    #[test]
    fn test_task_id_none() {
        assert!(TaskId::NONE.is_none());
        assert_eq!(TaskId::NONE.to_option(), None);
        assert_eq!(TaskId::default(), TaskId::NONE);
        assert_eq!(format!("{:?}", TaskId::NONE), "TaskId(NONE)");
    }

    #[test]
    fn test_from_index_rejects_sentinel() {
        assert_eq!(TaskId::from_index(7), Some(TaskId::new(7)));
        assert_eq!(TaskId::from_index(u32::MAX as usize), None);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(TaskId::from_index(u32::MAX as usize + 1), None);
    }
}
