//! Process-wide lock around the operator's terminal.
//!
//! Signature checks and keyring commands may prompt for a passphrase, so at
//! most one of them runs at a time. Waiters are served in arrival order.
//! While the lock is held, log output is parked in memory and written out
//! when it is released so it never interleaves with a prompt.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
pub struct InteractiveLock {
    turn: Arc<AsyncMutex<()>>,
    gate: Arc<Mutex<Gate>>,
}

struct Gate {
    held: bool,
    pending: Vec<u8>,
    sink: Box<dyn Write + Send>,
}

impl std::fmt::Debug for InteractiveLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveLock")
            .field("held", &self.is_held())
            .finish()
    }
}

impl Default for InteractiveLock {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractiveLock {
    /// Lock whose gated output goes to stderr.
    pub fn new() -> Self {
        Self::with_sink(io::stderr())
    }

    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self {
            turn: Arc::new(AsyncMutex::new(())),
            gate: Arc::new(Mutex::new(Gate {
                held: false,
                pending: Vec::new(),
                sink: Box::new(sink),
            })),
        }
    }

    /// Waits for the terminal. Output is gated until the guard is dropped.
    pub async fn acquire(&self) -> InteractiveGuard {
        let turn = self.turn.clone().lock_owned().await;
        self.gate.lock().held = true;
        InteractiveGuard {
            _turn: turn,
            gate: self.gate.clone(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.gate.lock().held
    }

    pub fn writer(&self) -> GatedWriter {
        GatedWriter {
            gate: self.gate.clone(),
        }
    }
}

pub struct InteractiveGuard {
    _turn: OwnedMutexGuard<()>,
    gate: Arc<Mutex<Gate>>,
}

impl Drop for InteractiveGuard {
    fn drop(&mut self) {
        let mut gate = self.gate.lock();
        gate.held = false;
        let pending = std::mem::take(&mut gate.pending);
        let _ = gate.sink.write_all(&pending);
        let _ = gate.sink.flush();
    }
}

/// Writer handed to the log subscriber.
pub struct GatedWriter {
    gate: Arc<Mutex<Gate>>,
}

impl Write for GatedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut gate = self.gate.lock();
        if gate.held {
            gate.pending.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            gate.sink.write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut gate = self.gate.lock();
        if gate.held {
            return Ok(());
        }
        gate.sink.flush()
    }
}

impl<'a> MakeWriter<'a> for InteractiveLock {
    type Writer = GatedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;

    /// Cloneable in-memory sink.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_output_parked_while_held() {
        let out = SharedBuf::default();
        let lock = InteractiveLock::with_sink(out.clone());

        writeln!(lock.writer(), "before").unwrap();
        let guard = lock.acquire().await;
        assert!(lock.is_held());
        writeln!(lock.writer(), "during").unwrap();
        assert_eq!(out.text(), "before\n");

        drop(guard);
        assert!(!lock.is_held());
        assert_eq!(out.text(), "before\nduring\n");
        writeln!(lock.writer(), "after").unwrap();
        assert_eq!(out.text(), "before\nduring\nafter\n");
    }

    #[tokio::test]
    async fn test_one_holder_at_a_time_in_order() {
        let lock = InteractiveLock::with_sink(io::sink());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = lock.acquire().await;
        let mut handles = Vec::new();
        for i in 0..3 {
            let lock = lock.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire().await;
                order.lock().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
            //let each task queue up before the next one
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(order.lock().is_empty());
        drop(first);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
