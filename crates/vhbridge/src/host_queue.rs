use tokio::sync::mpsc;

use crate::host::HostAdapter;

pub type HostTask = Box<dyn FnOnce(&mut dyn HostAdapter) + Send + 'static>;

/// Cloneable sender side: the "submit to host thread" primitive.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::UnboundedSender<HostTask>,
}

impl HostHandle {
    /// Queue `f` to run on the host thread at its next drain.
    ///
    /// Returns false only if the host side has shut down.
    pub fn submit<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut dyn HostAdapter) + Send + 'static,
    {
        self.tx.send(Box::new(f)).is_ok()
    }
}

/// Receiver side, owned by the host loop.
pub struct HostQueue {
    rx: mpsc::UnboundedReceiver<HostTask>,
    handle: HostHandle,
}

impl Default for HostQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl HostQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: HostHandle { tx },
        }
    }

    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Run everything queued so far, in submission order. Never blocks.
    pub fn run_pending(&mut self, host: &mut dyn HostAdapter) -> usize {
        let mut n = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(host);
            n += 1;
        }
        n
    }
}
