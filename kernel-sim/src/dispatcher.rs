//! Context switching on the host: every kernel thread is an OS thread and
//! only the holder of the baton runs. `dispatch_to` passes the baton and
//! parks until it comes back.

use std::cell::Cell;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use scheduler::{Dispatcher, Tid};

/// The thread running `main`
pub const BOOT: Tid = Tid::new(0);

thread_local! {
    static CURRENT: Cell<Tid> = const { Cell::new(BOOT) };
    /// Set once the thread has exited; it no longer waits for the baton
    static RETIRED: Cell<bool> = const { Cell::new(false) };
}

pub struct HostDispatcher {
    running: Mutex<Tid>,
    baton: Condvar,
}

impl HostDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: Mutex::new(BOOT),
            baton: Condvar::new(),
        })
    }

    /// Spawns `thread`; its body starts the first time it is dispatched to.
    pub fn spawn<F>(self: &Arc<Self>, thread: Tid, body: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let dispatcher = self.clone();
        thread::Builder::new()
            .name(format!("kernel-{thread}"))
            .spawn(move || {
                CURRENT.set(thread);
                dispatcher.wait_for(thread);
                body();
            })
            .expect("failed to spawn a kernel thread")
    }

    pub fn is_running(&self, thread: Tid) -> bool {
        *self.running.lock().unwrap() == thread
    }

    /// Marks the calling thread as finished: the next dispatch hands the
    /// baton over without waiting for it to come back.
    pub fn retire(&self) {
        RETIRED.set(true);
    }

    /// Gives the baton to `thread` without parking the caller.
    pub fn hand_off(&self, thread: Tid) {
        *self.running.lock().unwrap() = thread;
        self.baton.notify_all();
    }

    fn wait_for(&self, thread: Tid) {
        let mut running = self.running.lock().unwrap();
        while *running != thread {
            running = self.baton.wait(running).unwrap();
        }
    }
}

impl Dispatcher for HostDispatcher {
    fn dispatch_to(&self, thread: Tid) {
        let me = CURRENT.get();
        if thread == me {
            return;
        }

        log::trace!("context switch {me} -> {thread}");
        self.hand_off(thread);
        if !RETIRED.get() {
            self.wait_for(me);
        }
    }

    fn current_thread(&self) -> Tid {
        CURRENT.get()
    }
}
