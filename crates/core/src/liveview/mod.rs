use std::time::{Duration, Instant};

use crate::matrix::FrameBuffer;

/// ASCII marker in front of every streamed frame.
pub const LIVEVIEW_PREFIX: &[u8; 3] = b"LV:";

/// Where sampled frames go. The core knows nothing about the transport;
/// broadcast, unicast and framing are the sink's business.
pub trait LiveviewSink {
    /// How many consumers currently want frames. Zero turns the flush
    /// phase into a no-op.
    fn subscriber_count(&self) -> usize {
        1
    }

    fn publish(&mut self, frame: &[u8]);
}

/// Streams pixel snapshots to a sink without stalling the renderer.
///
/// Two-phase design: [`Liveview::sample`] runs right after a render tick
/// and only copies memory and hashes it; [`Liveview::flush`] runs later
/// in the same loop iteration, after other I/O has had a chance to drain
/// its buffers, and performs the actual publish. Sampling immediately
/// after render guarantees the streamed frame matches what was drawn;
/// deferring the publish minimises the chance that a slow consumer
/// blocks the next tick.
pub struct Liveview {
    interval: Duration,
    last_sample: Option<Instant>,
    buf: Vec<u8>,
    pending_checksum: u32,
    sent_checksum: u32,
    dirty: bool,
    sink: Option<Box<dyn LiveviewSink>>,
}

impl Liveview {
    /// `interval_ms` of zero disables sampling entirely.
    pub fn new(interval_ms: u16) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms as u64),
            last_sample: None,
            buf: Vec::new(),
            pending_checksum: 0,
            sent_checksum: 0,
            dirty: false,
            sink: None,
        }
    }

    pub fn set_interval(&mut self, interval_ms: u16) {
        self.interval = Duration::from_millis(interval_ms as u64);
    }

    pub fn set_sink(&mut self, sink: Box<dyn LiveviewSink>) {
        self.sink = Some(sink);
    }

    /// Sample phase: copies every pixel through the physical index map
    /// into the staging buffer and computes its checksum. No I/O happens
    /// here. Returns true when a frame with new content was staged.
    ///
    /// The checksum is compared against the last *published* one, not
    /// the last computed one; capture and transmit are decoupled in
    /// time. Sampling keeps running with no sink attached so a
    /// reconnecting subscriber gets a frame with low latency.
    pub fn sample(&mut self, frame: &FrameBuffer, now: Instant) -> bool {
        if self.interval.is_zero() {
            return false;
        }
        if let Some(last) = self.last_sample {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_sample = Some(now);

        self.buf.clear();
        self.buf.extend_from_slice(LIVEVIEW_PREFIX);
        let leds = frame.as_leds();
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                let led = leds[frame.xy(x, y)];
                self.buf.extend_from_slice(&[led.r, led.g, led.b]);
            }
        }

        // Change detection only, not integrity: hash the pixel region.
        self.pending_checksum = crc32fast::hash(&self.buf[LIVEVIEW_PREFIX.len()..]);
        self.dirty = self.pending_checksum != self.sent_checksum;
        self.dirty
    }

    /// Flush phase: publishes the staged frame if it is dirty and a sink
    /// with subscribers is attached. Returns true when a frame went out.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        if sink.subscriber_count() == 0 {
            return false;
        }

        sink.publish(&self.buf);
        self.sent_checksum = self.pending_checksum;
        self.dirty = false;
        tracing::trace!(
            bytes = self.buf.len(),
            checksum = self.sent_checksum,
            "liveview frame published"
        );
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pending_checksum(&self) -> u32 {
        self.pending_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixLayout, Rgb};
    use std::{
        cell::RefCell,
        rc::Rc,
        time::{Duration, Instant},
    };

    #[derive(Clone, Default)]
    struct TestSink {
        frames: Rc<RefCell<Vec<Vec<u8>>>>,
        subscribers: usize,
    }

    impl LiveviewSink for TestSink {
        fn subscriber_count(&self) -> usize {
            self.subscribers
        }

        fn publish(&mut self, frame: &[u8]) {
            self.frames.borrow_mut().push(frame.to_vec());
        }
    }

    fn frame_32x8() -> FrameBuffer {
        FrameBuffer::new(32, 8, MatrixLayout::TiledRows)
    }

    #[test]
    fn all_black_frame_is_zero_after_the_prefix() {
        let frame = frame_32x8();
        let mut liveview = Liveview::new(10);
        let sink = TestSink {
            subscribers: 1,
            ..TestSink::default()
        };
        let frames = sink.frames.clone();
        liveview.set_sink(Box::new(sink));

        assert!(liveview.sample(&frame, Instant::now()));
        assert!(liveview.flush());

        let sent = frames.borrow();
        assert_eq!(&sent[0][..3], LIVEVIEW_PREFIX);
        assert_eq!(sent[0].len(), 3 + 32 * 8 * 3);
        assert!(sent[0][3..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn sampling_twice_without_a_render_is_idempotent() {
        let frame = frame_32x8();
        let mut liveview = Liveview::new(1);
        let t0 = Instant::now();

        liveview.sample(&frame, t0);
        let first = liveview.pending_checksum();
        liveview.sample(&frame, t0 + Duration::from_millis(5));
        assert_eq!(liveview.pending_checksum(), first);
    }

    #[test]
    fn one_dirty_sample_publishes_exactly_once() {
        let frame = frame_32x8();
        let mut liveview = Liveview::new(10);
        let sink = TestSink {
            subscribers: 1,
            ..TestSink::default()
        };
        let frames = sink.frames.clone();
        liveview.set_sink(Box::new(sink));

        liveview.sample(&frame, Instant::now());
        assert!(liveview.flush());
        assert!(!liveview.flush());
        assert_eq!(frames.borrow().len(), 1);
    }

    #[test]
    fn unchanged_content_is_deduplicated() {
        let frame = frame_32x8();
        let mut liveview = Liveview::new(1);
        let sink = TestSink {
            subscribers: 1,
            ..TestSink::default()
        };
        let frames = sink.frames.clone();
        liveview.set_sink(Box::new(sink));
        let t0 = Instant::now();

        liveview.sample(&frame, t0);
        liveview.flush();
        // Same pixels, later sample: checksum matches the published one.
        assert!(!liveview.sample(&frame, t0 + Duration::from_millis(5)));
        assert!(!liveview.flush());
        assert_eq!(frames.borrow().len(), 1);
    }

    #[test]
    fn changed_pixels_mark_the_frame_dirty() {
        let mut frame = frame_32x8();
        let mut liveview = Liveview::new(1);
        let t0 = Instant::now();

        liveview.sample(&frame, t0);
        frame.set(4, 4, Rgb::new(10, 20, 30));
        assert!(liveview.sample(&frame, t0 + Duration::from_millis(5)));
    }

    #[test]
    fn zero_subscribers_keeps_the_frame_staged() {
        let mut frame = frame_32x8();
        frame.set(0, 0, Rgb::WHITE);
        let mut liveview = Liveview::new(10);
        let sink = TestSink {
            subscribers: 0,
            ..TestSink::default()
        };
        let frames = sink.frames.clone();
        liveview.set_sink(Box::new(sink));

        liveview.sample(&frame, Instant::now());
        assert!(!liveview.flush());
        assert!(liveview.is_dirty());
        assert!(frames.borrow().is_empty());
    }

    #[test]
    fn no_sink_is_a_quiet_no_op_but_sampling_continues() {
        let mut frame = frame_32x8();
        frame.set(1, 1, Rgb::WHITE);
        let mut liveview = Liveview::new(10);

        assert!(liveview.sample(&frame, Instant::now()));
        assert!(!liveview.flush());
        assert!(liveview.is_dirty());
    }

    #[test]
    fn interval_zero_disables_sampling() {
        let frame = frame_32x8();
        let mut liveview = Liveview::new(0);
        assert!(!liveview.sample(&frame, Instant::now()));
    }

    #[test]
    fn pixels_are_captured_through_the_physical_map() {
        let mut frame = FrameBuffer::new(32, 8, MatrixLayout::RowsZigzag);
        frame.set(31, 1, Rgb::new(9, 8, 7));
        let mut liveview = Liveview::new(10);
        liveview.sample(&frame, Instant::now());

        // Logical row-major position of (31, 1) in the payload.
        let offset = 3 + (1 * 32 + 31) * 3;
        assert_eq!(&liveview.buf[offset..offset + 3], &[9, 8, 7]);
    }
}
