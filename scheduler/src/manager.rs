//! FIFO 协作式调度器

use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use spin::Mutex;

use crate::{Dispatcher, Enqueue, IoCompletion, ReadyQueue, Tid};

pub struct Scheduler {
    ready_queue: Mutex<ReadyQueue>,
    dispatcher: Arc<dyn Dispatcher>,
    /// 由调度器代为轮询的磁盘驱动
    io_sources: Mutex<Vec<Weak<dyn IoCompletion>>>,
}

impl Scheduler {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            ready_queue: Mutex::new(ReadyQueue::new()),
            dispatcher,
            io_sources: Mutex::new(Vec::new()),
        }
    }

    /// 登记一个磁盘驱动，此后每次分派前都会替候选线程轮询它。
    /// 只持有弱引用，驱动销毁后自动失效。
    pub fn attach<S: IoCompletion + 'static>(&self, source: &Arc<S>) {
        let source: Arc<dyn IoCompletion> = source.clone();
        self.io_sources.lock().push(Arc::downgrade(&source));
    }

    #[inline]
    pub fn current(&self) -> Tid {
        self.dispatcher.current_thread()
    }

    pub fn add(&self, thread: Tid) {
        log::info!("adding thread {thread} into the ready queue");
        self.resume(thread);
    }

    pub fn resume(&self, thread: Tid) {
        match self.ready_queue.lock().push_back(thread) {
            Enqueue::Queued => log::trace!("thread {thread} resumed"),
            Enqueue::Duplicate => {
                log::debug!("thread {thread} already exists in the ready queue, not scheduling again")
            }
            Enqueue::Full => log::warn!("ready queue is full, thread {thread} dropped"),
        }
    }

    /// 选出下一个可运行的线程并分派过去。
    ///
    /// 队列为空，或队内线程全部在等待未就绪的设备时，不分派，直接返回。
    pub fn yield_now(&self) {
        if let Some(next) = self.select() {
            log::trace!("dispatch to thread {next}");
            self.dispatcher.dispatch_to(next);
        }
    }

    /// 把当前线程放回队尾并让出处理器
    pub fn reschedule(&self) {
        self.resume(self.current());
        self.yield_now();
    }

    pub fn terminate(&self, thread: Tid) {
        log::debug!("terminating thread {thread}");
        if !self.ready_queue.lock().remove(thread) {
            log::warn!("no thread {thread} in the ready queue");
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ready_queue.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ready_queue.lock().is_empty()
    }

    pub fn contains(&self, thread: Tid) -> bool {
        self.ready_queue.lock().contains(thread)
    }

    /// 自队首至队尾的快照
    pub fn ready_threads(&self) -> Vec<Tid> {
        self.ready_queue.lock().iter().collect()
    }

    /// 每个在队线程至多被检查一次：
    /// I/O 已完成或没有 I/O 的候选者出队返回；
    /// 仍在等待设备的候选者回到队尾，决策从新的队首重新开始。
    fn select(&self) -> Option<Tid> {
        let io_sources = self.io_sources();
        let mut queue = self.ready_queue.lock();

        if queue.is_empty() {
            log::debug!("ready queue is empty");
            return None;
        }

        for _ in 0..queue.len() {
            let candidate = queue.pop_front()?;
            if Self::pump_io(&io_sources, candidate) {
                return Some(candidate);
            }

            log::trace!("thread {candidate} is waiting on the disk, deferred");
            queue.push_back(candidate);
        }

        log::trace!("every ready thread is waiting on the disk");
        None
    }

    /// 为 `candidate` 搬运所有已就绪的请求。
    /// 仍有未就绪的请求时返回 `false`。
    fn pump_io(io_sources: &[Arc<dyn IoCompletion>], candidate: Tid) -> bool {
        for source in io_sources {
            for slot in source.pending_for(candidate) {
                if !source.is_device_ready() {
                    return false;
                }
                source.complete(slot);
            }
        }

        true
    }

    fn io_sources(&self) -> Vec<Arc<dyn IoCompletion>> {
        let mut io_sources = self.io_sources.lock();
        io_sources.retain(|source| source.strong_count() > 0);
        io_sources.iter().filter_map(Weak::upgrade).collect()
    }
}
