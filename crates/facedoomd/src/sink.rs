use facedoom_core::ExpressionSink;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::mpsc;

/// Expression sink for an engine living in another process: every code
/// is queued for broadcast as a D-Bus signal.
pub struct SignalSink {
    tx: mpsc::UnboundedSender<i32>,
    last: AtomicI32,
}

impl SignalSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<i32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            last: AtomicI32::new(facedoom_core::Expression::Disabled.code()),
        };
        (sink, rx)
    }

    /// Most recent code handed to the engine.
    pub fn last(&self) -> i32 {
        self.last.load(Ordering::SeqCst)
    }
}

impl ExpressionSink for SignalSink {
    fn set_face_expression(&self, code: i32) {
        self.last.store(code, Ordering::SeqCst);
        if self.tx.send(code).is_err() {
            tracing::trace!(code, "signal forwarder gone; expression dropped");
        }
    }
}
