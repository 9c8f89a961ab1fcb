use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::thread::Thread;

/// 三条就绪队列与延迟销毁槽。
/// 不变式：每个就绪线程恰好在一条队列里，
/// 且该队列与它当前的优先级区间一致。
pub struct Scheduler {
    l1: VecDeque<Arc<Thread>>,
    l2: VecDeque<Arc<Thread>>,
    l3: VecDeque<Arc<Thread>>,
    /// 等着销毁的前一个线程，至多一个。
    /// 线程不能在自己的栈上自毁，要等下一次调度后清理。
    pub(crate) to_be_destroyed: Option<Arc<Thread>>,
}

/// 就绪队列的层级，由优先级区间决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLevel {
    L1,
    L2,
    L3,
}

impl QueueLevel {
    /// 优先级所属的层级
    pub fn of(priority: u32) -> Self {
        match priority {
            100..=149 => Self::L1,
            50..=99 => Self::L2,
            _ => Self::L3,
        }
    }
}

impl fmt::Display for QueueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
            Self::L3 => write!(f, "L3"),
        }
    }
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            l1: VecDeque::new(),
            l2: VecDeque::new(),
            l3: VecDeque::new(),
            to_be_destroyed: None,
        }
    }

    /// 线程排进指定队列尾部
    pub(crate) fn insert(&mut self, level: QueueLevel, thread: Arc<Thread>) {
        assert!(
            self.level_of(&thread).is_none(),
            "thread {} is already queued",
            thread.name()
        );
        self.queue_mut(level).push_back(thread);
    }

    /// 把线程从指定队列摘走
    pub(crate) fn remove(&mut self, level: QueueLevel, thread: &Arc<Thread>) {
        let target = Arc::as_ptr(thread);
        let queue = self.queue_mut(level);

        let index = queue
            .iter()
            .position(|queued| Arc::as_ptr(queued) == target)
            .expect("thread is not in the queue");
        queue.remove(index);
    }

    /// 取走指定队列的队首
    pub(crate) fn remove_front(&mut self, level: QueueLevel) -> Option<Arc<Thread>> {
        let index = self.index_of_front(level)?;
        self.queue_mut(level).remove(index)
    }

    /// 最高的非空层级
    pub(crate) fn first_nonempty(&self) -> Option<QueueLevel> {
        [QueueLevel::L1, QueueLevel::L2, QueueLevel::L3]
            .into_iter()
            .find(|&level| !self.queue(level).is_empty())
    }

    /// 线程当前排在哪条队列
    pub fn level_of(&self, thread: &Arc<Thread>) -> Option<QueueLevel> {
        let target = Arc::as_ptr(thread);
        [QueueLevel::L1, QueueLevel::L2, QueueLevel::L3]
            .into_iter()
            .find(|&level| {
                self.queue(level)
                    .iter()
                    .any(|queued| Arc::as_ptr(queued) == target)
            })
    }

    /// 全部就绪线程的快照，老化扫描用
    pub(crate) fn ready_snapshot(&self) -> Vec<Arc<Thread>> {
        self.l1
            .iter()
            .chain(&self.l2)
            .chain(&self.l3)
            .cloned()
            .collect()
    }

    /// 队首的位置：
    /// L1 取突发估计最小者，L2 取优先级最高者，L3 取最先入队者；
    /// 平手时都保持入队顺序。
    fn index_of_front(&self, level: QueueLevel) -> Option<usize> {
        let queue = self.queue(level);

        match level {
            QueueLevel::L1 => Self::scan(queue, |a, b| a.burst_time() < b.burst_time()),
            QueueLevel::L2 => Self::scan(queue, |a, b| a.priority() > b.priority()),
            QueueLevel::L3 => (!queue.is_empty()).then_some(0),
        }
    }

    fn scan(
        queue: &VecDeque<Arc<Thread>>,
        better: impl Fn(&Arc<Thread>, &Arc<Thread>) -> bool,
    ) -> Option<usize> {
        let mut front: Option<usize> = None;
        for (index, thread) in queue.iter().enumerate() {
            // 严格更优才替换，平手保持入队顺序
            if front.is_none_or(|front| better(thread, &queue[front])) {
                front = Some(index);
            }
        }
        front
    }

    fn queue(&self, level: QueueLevel) -> &VecDeque<Arc<Thread>> {
        match level {
            QueueLevel::L1 => &self.l1,
            QueueLevel::L2 => &self.l2,
            QueueLevel::L3 => &self.l3,
        }
    }

    fn queue_mut(&mut self, level: QueueLevel) -> &mut VecDeque<Arc<Thread>> {
        match level {
            QueueLevel::L1 => &mut self.l1,
            QueueLevel::L2 => &mut self.l2,
            QueueLevel::L3 => &mut self.l3,
        }
    }
}

impl Default for Scheduler {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
