use alloc::sync::Arc;

use crate::stats::Statistics;
use crate::thread::Thread;

/// 机器相关原语的接口，由宿主机实现
pub trait Machine {
    /// 上下文切换：换上 new 的栈；返回时又在 old 的栈帧上执行
    fn switch(&mut self, old: &Arc<Thread>, new: &Arc<Thread>);

    /// 没有就绪线程时推进时钟，等待某个线程被唤醒
    fn idle(&mut self, stats: &mut Statistics) {
        stats.advance_idle(10);
    }
}
