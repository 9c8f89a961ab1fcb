//! # 三级反馈队列调度器
//!
//! 就绪线程按优先级分层排队：
//! - L1（优先级100..=149）：最短作业优先，可抢占；
//! - L2（优先级50..=99）：高优先级先行，不抢占；
//! - L3（优先级0..=49）：先进先出，靠周期让出轮转。
//!
//! 等待过久的就绪线程由老化机制提升优先级，必要时迁移队列；
//! 这是防止饥饿的唯一手段。
//!
//! 单处理器协作式模型：调度操作的互斥完全靠关中断，
//! 调度器内部禁止使用锁（等锁会再次进入调度器）。
//! 所有入口都以显式的内核上下文 [`Kernel`] 代替全局单例。

#![no_std]

extern crate alloc;

mod interrupt;
mod kernel;
mod machine;
mod scheduler;
mod stats;
mod thread;

pub use self::interrupt::{IntLevel, Interrupt};
pub use self::kernel::Kernel;
pub use self::machine::Machine;
pub use self::scheduler::{QueueLevel, Scheduler};
pub use self::stats::Statistics;
pub use self::thread::{AddressSpace, Status, Thread, ThreadId};

/// 优先级上限
pub const PRIORITY_MAX: u32 = 149;
/// 触发老化的等待时长(tick)
pub const AGING_TICKS: u64 = 1500;
/// 一次老化提升的优先级
pub const AGING_BOOST: u32 = 10;
