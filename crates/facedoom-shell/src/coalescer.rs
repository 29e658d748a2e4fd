//! Latest-frame-wins delivery to a presentation surface.

use crate::queue::SerialQueue;
use facedoom_hw::RgbaFrame;
use std::sync::{Arc, Mutex, MutexGuard};

/// Something that shows engine frames. Always called on the presentation queue.
pub trait FrameSurface: Send + Sync {
    fn present(&self, frame: &RgbaFrame);
}

#[derive(Default)]
struct Pending {
    frame: Option<RgbaFrame>,
    scheduled: bool,
}

/// Collapses bursts of frames into one delivery.
///
/// At most one flush is queued at a time. Frames submitted before it runs
/// replace each other; the flush hands only the newest to the surface.
#[derive(Clone)]
pub struct FrameCoalescer {
    pending: Arc<Mutex<Pending>>,
    presenter: SerialQueue,
    surface: Arc<dyn FrameSurface>,
}

impl FrameCoalescer {
    pub fn new(presenter: SerialQueue, surface: Arc<dyn FrameSurface>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending::default())),
            presenter,
            surface,
        }
    }

    fn lock(pending: &Mutex<Pending>) -> MutexGuard<'_, Pending> {
        pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand over a frame. Malformed frames (non-positive size, wrong
    /// length) are dropped without touching the pending one.
    pub fn submit(&self, data: Vec<u8>, width: i64, height: i64) {
        let frame = match RgbaFrame::new(data, width, height) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::trace!(error = %e, "dropping malformed frame");
                return;
            }
        };

        let mut pending = Self::lock(&self.pending);
        pending.frame = Some(frame);
        if pending.scheduled {
            return;
        }
        pending.scheduled = true;
        drop(pending);

        let this = self.clone();
        self.presenter.dispatch(move || this.flush());
    }

    fn flush(&self) {
        let frame = {
            let mut pending = Self::lock(&self.pending);
            pending.scheduled = false;
            pending.frame.take()
        };
        if let Some(frame) = frame {
            self.surface.present(&frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Default)]
    struct RecordingSurface {
        frames: Mutex<Vec<(u8, Option<String>, bool)>>,
    }

    impl FrameSurface for RecordingSurface {
        fn present(&self, frame: &RgbaFrame) {
            let thread = std::thread::current().name().map(str::to_string);
            let tag = frame.data()[0];
            let whole = frame.data().iter().all(|b| *b == tag);
            self.frames.lock().unwrap().push((tag, thread, whole));
        }
    }

    fn frame(tag: u8) -> Vec<u8> {
        vec![tag; 2 * 2 * 4]
    }

    #[test]
    fn test_burst_delivers_only_latest() {
        let queue = SerialQueue::new("test-present").unwrap();
        let surface = Arc::new(RecordingSurface::default());
        let coalescer = FrameCoalescer::new(queue.clone(), surface.clone());

        // Hold the queue so submits pile up behind the first flush.
        let (release_tx, release_rx) = mpsc::channel::<()>();
        queue.dispatch(move || {
            let _ = release_rx.recv();
        });
        for tag in 1..=5 {
            coalescer.submit(frame(tag), 2, 2);
        }
        release_tx.send(()).unwrap();
        queue.sync(|| ()).unwrap();

        let frames = surface.frames.lock().unwrap().clone();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, 5);
        assert_eq!(frames[0].1.as_deref(), Some("test-present"));
    }

    #[test]
    fn test_each_drain_gets_latest_before_it() {
        let queue = SerialQueue::new("test-drains").unwrap();
        let surface = Arc::new(RecordingSurface::default());
        let coalescer = FrameCoalescer::new(queue.clone(), surface.clone());

        for round in 0..3u8 {
            let (release_tx, release_rx) = mpsc::channel::<()>();
            queue.dispatch(move || {
                let _ = release_rx.recv();
            });
            coalescer.submit(frame(round * 10 + 1), 2, 2);
            coalescer.submit(frame(round * 10 + 2), 2, 2);
            release_tx.send(()).unwrap();
            queue.sync(|| ()).unwrap();
        }

        let tags: Vec<u8> = surface.frames.lock().unwrap().iter().map(|f| f.0).collect();
        assert_eq!(tags, vec![2, 12, 22]);
    }

    #[test]
    fn test_malformed_frames_dropped() {
        let queue = SerialQueue::new("test-malformed").unwrap();
        let surface = Arc::new(RecordingSurface::default());
        let coalescer = FrameCoalescer::new(queue.clone(), surface.clone());

        let (release_tx, release_rx) = mpsc::channel::<()>();
        queue.dispatch(move || {
            let _ = release_rx.recv();
        });
        coalescer.submit(frame(7), 2, 2);
        coalescer.submit(frame(8), 0, 2);
        coalescer.submit(frame(9), 2, -2);
        coalescer.submit(vec![1; 3], 2, 2);
        coalescer.submit(frame(10), 4_000_000_000, 4_000_000_000);
        release_tx.send(()).unwrap();
        queue.sync(|| ()).unwrap();

        let tags: Vec<u8> = surface.frames.lock().unwrap().iter().map(|f| f.0).collect();
        assert_eq!(tags, vec![7]);
    }

    #[test]
    fn test_concurrent_submitters_deliver_whole_frames_latest_last() {
        const THREADS: u8 = 4;
        const PER_THREAD: u8 = 50;
        const LAST: u8 = 255;

        let queue = SerialQueue::new("test-concurrent").unwrap();
        let surface = Arc::new(RecordingSurface::default());
        let coalescer = FrameCoalescer::new(queue.clone(), surface.clone());

        let submitters: Vec<_> = (0..THREADS)
            .map(|t| {
                let coalescer = coalescer.clone();
                std::thread::spawn(move || {
                    for seq in 0..PER_THREAD {
                        let tag = t * PER_THREAD + seq + 1;
                        coalescer.submit(vec![tag; 16 * 16 * 4], 16, 16);
                    }
                })
            })
            .collect();
        for submitter in submitters {
            submitter.join().unwrap();
        }
        coalescer.submit(vec![LAST; 16 * 16 * 4], 16, 16);
        queue.sync(|| ()).unwrap();

        let frames = surface.frames.lock().unwrap().clone();
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|(_, _, whole)| *whole));
        assert!(frames.iter().all(|(_, thread, _)| thread.as_deref() == Some("test-concurrent")));
        assert_eq!(frames.last().unwrap().0, LAST);

        // A submitter's frames never arrive out of order.
        for t in 0..THREADS {
            let range = (t * PER_THREAD + 1)..=((t + 1) * PER_THREAD);
            let tags: Vec<u8> = frames.iter().map(|f| f.0).filter(|tag| range.contains(tag)).collect();
            assert!(tags.windows(2).all(|w| w[0] < w[1]), "thread {t}: {tags:?}");
        }
    }

    #[test]
    fn test_no_frames_no_delivery() {
        let queue = SerialQueue::new("test-empty").unwrap();
        let surface = Arc::new(RecordingSurface::default());
        let _coalescer = FrameCoalescer::new(queue.clone(), surface.clone());
        queue.sync(|| ()).unwrap();
        assert!(surface.frames.lock().unwrap().is_empty());
    }
}
