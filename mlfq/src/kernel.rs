use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt::Write;

use crate::interrupt::{IntLevel, Interrupt};
use crate::machine::Machine;
use crate::scheduler::{QueueLevel, Scheduler};
use crate::stats::Statistics;
use crate::thread::{Status, Thread};
use crate::{AGING_BOOST, AGING_TICKS, PRIORITY_MAX};

/// 内核上下文：调度操作显式经由它，而非全局单例。
/// 线程之间不直接相互引用，由上下文统一中转。
pub struct Kernel {
    /// 当前占有CPU的线程，有且只有它处于 Running
    current: Arc<Thread>,
    scheduler: Scheduler,
    pub stats: Statistics,
    pub interrupt: Interrupt,
    machine: Box<dyn Machine>,
    /// 调度事件行的去处
    console: Box<dyn Write + Send>,
}

impl Kernel {
    /// 以启动线程为当前线程建立上下文
    pub fn new(
        main: Arc<Thread>,
        machine: Box<dyn Machine>,
        console: Box<dyn Write + Send>,
    ) -> Self {
        main.set_status(Status::Running);

        Self {
            current: main,
            scheduler: Scheduler::new(),
            stats: Statistics::new(),
            interrupt: Interrupt::new(),
            machine,
            console,
        }
    }

    #[inline]
    pub fn current(&self) -> &Arc<Thread> {
        &self.current
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// 线程进入就绪态，排进优先级所属的队列。
    /// 前提：中断已关。
    pub fn ready_to_run(&mut self, thread: &Arc<Thread>) {
        assert_eq!(self.interrupt.level(), IntLevel::Off);
        log::debug!("putting thread {} on ready queue", thread.name());

        thread.set_status(Status::Ready);

        let level = QueueLevel::of(thread.priority());
        self.scheduler.insert(level, thread.clone());
        self.log_queue(thread, "inserted into", level);

        // 线程自此开始等待
        thread.set_start_wait_time(self.stats.total_ticks());

        // 只有落进 L1 才可能抢占
        if level == QueueLevel::L1 {
            self.preempt_on_shorter_burst(thread);
        }
    }

    /// 取出下一个该运行的线程：L1 优先于 L2 优先于 L3。
    /// 前提：中断已关。
    pub fn find_next_to_run(&mut self) -> Option<Arc<Thread>> {
        assert_eq!(self.interrupt.level(), IntLevel::Off);

        let level = self.scheduler.first_nonempty()?;
        let thread = self
            .scheduler
            .remove_front(level)
            .expect("nonempty queue has a front");
        self.log_queue(&thread, "removed from", level);

        Some(thread)
    }

    /// 周期性调用：等待超过 [`AGING_TICKS`] 的就绪线程
    /// 优先级加 [`AGING_BOOST`]，跨过区间则迁移队列。
    /// 前提：中断已关。
    pub fn check_aging(&mut self) {
        assert_eq!(self.interrupt.level(), IntLevel::Off);

        for thread in self.scheduler.ready_snapshot() {
            self.age_thread(&thread);
        }
    }

    /// 调度 next 上CPU。
    /// 前提：中断已关，且当前线程的状态已被设置好
    /// （Ready、Blocked 或 Zombie）。
    pub fn run(&mut self, next: Arc<Thread>, finishing: bool) {
        let old = self.current.clone();

        let tick = self.stats.total_ticks();
        let user_tick = self.stats.user_ticks();

        next.set_start_time(user_tick);
        let executed = user_tick - old.start_time();

        let _ = writeln!(
            self.console,
            "Tick {tick}: Thread {} is now selected for execution",
            next.id()
        );
        let _ = writeln!(
            self.console,
            "Tick {tick}: Thread {} is replaced, and it has executed {executed} ticks",
            old.id()
        );

        assert_eq!(self.interrupt.level(), IntLevel::Off);

        if finishing {
            // 不能在自己的栈上自毁，挂进延迟销毁槽
            assert!(self.scheduler.to_be_destroyed.is_none());
            self.scheduler.to_be_destroyed = Some(old.clone());
        }

        if old.has_space() {
            old.save_user_state();
        }
        old.check_overflow();

        self.current = next.clone();
        next.set_status(Status::Running);

        log::debug!("switching from {} to {}", old.name(), next.name());
        self.machine.switch(&old, &next);

        // 回到这里时，又在 old 的栈帧上执行了
        assert_eq!(self.interrupt.level(), IntLevel::Off);

        self.check_to_be_destroyed();

        if old.has_space() {
            old.restore_user_state();
        }
    }

    /// 当前线程让出CPU，回到就绪队列
    pub fn yield_current(&mut self) {
        let old_level = self.interrupt.set_level(IntLevel::Off);
        log::debug!("yielding thread {}", self.current.name());

        if let Some(next) = self.find_next_to_run() {
            let current = self.current.clone();
            self.ready_to_run(&current);
            self.run(next, false);
        }

        self.interrupt.set_level(old_level);
    }

    /// 当前线程让出CPU并阻塞（finishing 则进入僵尸态）。
    /// 没有就绪线程时让机器空转，直到有线程可调度。
    /// 前提：中断已关。
    pub fn sleep_current(&mut self, finishing: bool) {
        assert_eq!(self.interrupt.level(), IntLevel::Off);
        log::debug!("sleeping thread {}", self.current.name());

        self.current.set_status(if finishing {
            Status::Zombie
        } else {
            Status::Blocked
        });

        let next = loop {
            if let Some(next) = self.find_next_to_run() {
                break next;
            }
            self.machine.idle(&mut self.stats);
        };

        self.run(next, finishing);
    }

    /// 当前线程结束。它的内存要等下一次调度之后才能归还。
    pub fn finish_current(&mut self) {
        self.interrupt.set_level(IntLevel::Off);
        log::debug!("finishing thread {}", self.current.name());

        self.sleep_current(true);
    }

    /// 延迟销毁槽里有没有尸体等着清理
    #[inline]
    pub fn has_pending_destroy(&self) -> bool {
        self.scheduler.to_be_destroyed.is_some()
    }

    fn age_thread(&mut self, thread: &Arc<Thread>) {
        let now = self.stats.total_ticks();
        if thread.status() != Status::Ready || now - thread.start_wait_time() < AGING_TICKS {
            return;
        }

        let old_priority = thread.priority();
        let new_priority = (old_priority + AGING_BOOST).min(PRIORITY_MAX);
        thread.set_priority(new_priority);
        if old_priority != new_priority {
            let id = thread.id();
            let _ = writeln!(
                self.console,
                "Tick {now}: Thread {id} changes its priority from {old_priority} to {new_priority}"
            );
        }

        if (100..110).contains(&new_priority) {
            // 升入 L1，按最短作业规则参与竞争
            self.scheduler.remove(QueueLevel::L2, thread);
            self.scheduler.insert(QueueLevel::L1, thread.clone());
            self.log_queue(thread, "removed from", QueueLevel::L2);
            self.log_queue(thread, "inserted into", QueueLevel::L1);

            self.preempt_on_shorter_burst(thread);
        } else if (50..60).contains(&new_priority) {
            // 升入 L2
            self.scheduler.remove(QueueLevel::L3, thread);
            self.scheduler.insert(QueueLevel::L2, thread.clone());
            self.log_queue(thread, "removed from", QueueLevel::L3);
            self.log_queue(thread, "inserted into", QueueLevel::L2);
        }

        // 重新计时等待
        thread.set_start_wait_time(now);
    }

    /// 最短作业优先的抢占测试：来者落进 L1 且当前线程也在
    /// L1 区间时，当前线程的下次突发估计按
    /// 0.5 * 已执行 + 0.5 * 旧估计 更新；来者更短则让位。
    fn preempt_on_shorter_burst(&mut self, candidate: &Arc<Thread>) {
        let current = self.current.clone();
        if QueueLevel::of(current.priority()) != QueueLevel::L1 {
            return;
        }
        if current.id() == candidate.id() {
            return;
        }

        let actual = (self.stats.user_ticks() - current.start_time()) as f64;
        let estimated = 0.5 * actual + 0.5 * current.burst_time() as f64;
        if (candidate.burst_time() as f64) < estimated {
            self.yield_current();
        }
    }

    /// 清理上一个结束线程的尸体
    fn check_to_be_destroyed(&mut self) {
        if let Some(dead) = self.scheduler.to_be_destroyed.take() {
            // 销毁对象绝不能是正在执行的线程
            assert!(!Arc::ptr_eq(&dead, &self.current));
            drop(dead);
        }
    }

    fn log_queue(&mut self, thread: &Arc<Thread>, verb: &str, level: QueueLevel) {
        let tick = self.stats.total_ticks();
        let id = thread.id();
        let _ = writeln!(self.console, "Tick {tick}: Thread {id} is {verb} queue {level}");
    }
}
