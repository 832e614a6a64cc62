use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc,
};

use crate::types::UiMsg;

/// Coalesces render requests: at most one `UiMsg::Render` is queued at a time.
#[derive(Clone)]
pub struct UpdateScheduler {
    pending: Arc<AtomicBool>,
    tx: Sender<UiMsg>,
}

impl UpdateScheduler {
    pub fn new(tx: Sender<UiMsg>) -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Safe to call from any thread.
    pub fn request_update(&self) {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if self.tx.send(UiMsg::Render).is_err() {
            self.pending.store(false, Ordering::SeqCst);
        }
    }

    /// Called by the UI loop before planning, so requests made while a render
    /// runs queue another one.
    pub fn begin_render(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }

    /// Queues a state message for the UI loop. Not coalesced.
    pub fn send(&self, msg: UiMsg) {
        let _ = self.tx.send(msg);
    }
}
