use alloc::boxed::Box;

use derive_more::{Display, From, Into};
use spin::Mutex;

use crate::PRIORITY_MAX;

/// 线程编号
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct ThreadId(u64);

impl ThreadId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// 线程生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    JustCreated,
    Ready,
    Running,
    Blocked,
    Zombie,
}

/// 用户地址空间的保存与恢复，由宿主机实现
pub trait AddressSpace: Send {
    fn save_state(&mut self);
    fn restore_state(&mut self);
}

/// 栈底哨兵字
const STACK_FENCE: u32 = 0xdead_beef;

pub struct Thread {
    // immutable
    id: ThreadId,
    name: &'static str,
    // mutable
    inner: Mutex<ThreadInner>,
}

struct ThreadInner {
    priority: u32,
    /// 下一次运行时长的估计值
    burst_time: u32,
    /// 最近一次被调度上CPU时的用户tick
    start_time: u64,
    /// 最近一次进入就绪态的tick
    start_wait_time: u64,
    status: Status,
    /// 用户程序才有地址空间
    space: Option<Box<dyn AddressSpace>>,
    stack_fence: u32,
}

impl Thread {
    pub fn new(id: ThreadId, name: &'static str, priority: u32, burst_time: u32) -> Self {
        assert!(priority <= PRIORITY_MAX);

        Self {
            id,
            name,
            inner: Mutex::new(ThreadInner {
                priority,
                burst_time,
                start_time: 0,
                start_wait_time: 0,
                status: Status::JustCreated,
                space: None,
                stack_fence: STACK_FENCE,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        self.inner.lock().priority
    }

    pub fn set_priority(&self, priority: u32) {
        assert!(priority <= PRIORITY_MAX);
        self.inner.lock().priority = priority;
    }

    #[inline]
    pub fn burst_time(&self) -> u32 {
        self.inner.lock().burst_time
    }

    #[inline]
    pub fn set_burst_time(&self, burst_time: u32) {
        self.inner.lock().burst_time = burst_time;
    }

    #[inline]
    pub fn start_time(&self) -> u64 {
        self.inner.lock().start_time
    }

    #[inline]
    pub fn set_start_time(&self, tick: u64) {
        self.inner.lock().start_time = tick;
    }

    #[inline]
    pub fn start_wait_time(&self) -> u64 {
        self.inner.lock().start_wait_time
    }

    #[inline]
    pub fn set_start_wait_time(&self, tick: u64) {
        self.inner.lock().start_wait_time = tick;
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    #[inline]
    pub fn set_status(&self, status: Status) {
        self.inner.lock().status = status;
    }

    pub fn set_space(&self, space: Box<dyn AddressSpace>) {
        self.inner.lock().space = Some(space);
    }

    #[inline]
    pub fn has_space(&self) -> bool {
        self.inner.lock().space.is_some()
    }

    /// 保存用户态的寄存器与地址空间状态
    pub fn save_user_state(&self) {
        if let Some(space) = &mut self.inner.lock().space {
            space.save_state();
        }
    }

    pub fn restore_user_state(&self) {
        if let Some(space) = &mut self.inner.lock().space {
            space.restore_state();
        }
    }

    /// 检查栈底哨兵有没有被写穿
    pub fn check_overflow(&self) {
        assert_eq!(
            self.inner.lock().stack_fence,
            STACK_FENCE,
            "thread {} overflowed its stack",
            self.name
        );
    }
}
