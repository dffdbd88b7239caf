use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    matrix::{FrameBuffer, Rgb},
    MatrixClockError, Result,
};

/// A small image sequence (icon animation) blitted next to page text.
#[derive(Debug, Clone)]
pub struct Animation {
    width: usize,
    height: usize,
    frame_delay: Duration,
    frames: Vec<Vec<Rgb>>,
}

impl Animation {
    pub fn new(
        width: usize,
        height: usize,
        frame_delay_ms: u16,
        frames: Vec<Vec<Rgb>>,
    ) -> Result<Self> {
        if frames.is_empty() {
            return Err(MatrixClockError::InvalidInput(
                "animation needs at least one frame",
            ));
        }
        if frames.iter().any(|frame| frame.len() != width * height) {
            return Err(MatrixClockError::InvalidInput(
                "animation frame size does not match its dimensions",
            ));
        }
        Ok(Self {
            width,
            height,
            frame_delay: Duration::from_millis(frame_delay_ms as u64),
            frames,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Named animations available to the pages.
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    items: HashMap<String, Arc<Animation>>,
}

impl AnimationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, animation: Animation) {
        self.items.insert(name.into(), Arc::new(animation));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Animation>> {
        self.items.get(name).cloned()
    }
}

/// Plays one animation at a time and keeps its own frame clock.
///
/// The scheduler owns three independent players (current page, next page
/// during a transition, overlays) so the image-sequence state of two
/// simultaneously visible pages never interferes.
#[derive(Debug, Default)]
pub struct FramePlayer {
    current: Option<(String, Arc<Animation>)>,
    frame: usize,
    last_advance: Option<Instant>,
}

impl FramePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an animation by name. Re-showing the one already loaded is
    /// a no-op and does not reset playback. Returns false when the
    /// library has no such animation; the previous one keeps playing.
    pub fn show(&mut self, name: &str, library: &AnimationLibrary) -> bool {
        if let Some((current, _)) = &self.current {
            if current == name {
                return true;
            }
        }
        match library.get(name) {
            Some(animation) => {
                self.current = Some((name.to_string(), animation));
                self.frame = 0;
                self.last_advance = None;
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        self.current = None;
        self.frame = 0;
        self.last_advance = None;
    }

    /// Advances the frame clock and blits the current frame at a logical
    /// offset. Without a loaded animation this draws nothing.
    pub fn play(&mut self, canvas: &mut FrameBuffer, x: i16, y: i16, now: Instant) {
        let Some((_, animation)) = &self.current else {
            return;
        };

        if animation.frames.len() > 1 && !animation.frame_delay.is_zero() {
            match self.last_advance {
                Some(last) if now.duration_since(last) >= animation.frame_delay => {
                    self.last_advance = Some(now);
                    self.frame = (self.frame + 1) % animation.frames.len();
                }
                None => self.last_advance = Some(now),
                _ => {}
            }
        }

        let frame = &animation.frames[self.frame];
        for (i, pixel) in frame.iter().enumerate() {
            let px = (i % animation.width) as i16;
            let py = (i / animation.width) as i16;
            canvas.set(x + px, y + py, *pixel);
        }
    }

    #[cfg(test)]
    fn current_frame(&self) -> usize {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixLayout;

    fn library_with(name: &str, frames: usize, delay_ms: u16) -> AnimationLibrary {
        let mut library = AnimationLibrary::new();
        let frames = (0..frames)
            .map(|i| vec![Rgb::new(i as u8 + 1, 0, 0); 4])
            .collect();
        library.insert(name, Animation::new(2, 2, delay_ms, frames).unwrap());
        library
    }

    #[test]
    fn rejects_mismatched_frames() {
        assert!(Animation::new(2, 2, 0, vec![vec![Rgb::BLACK; 3]]).is_err());
        assert!(Animation::new(2, 2, 0, vec![]).is_err());
    }

    #[test]
    fn showing_the_same_animation_does_not_reset_playback() {
        let library = library_with("icon", 3, 10);
        let mut canvas = FrameBuffer::new(32, 8, MatrixLayout::TiledRows);
        let mut player = FramePlayer::new();
        let t0 = Instant::now();

        assert!(player.show("icon", &library));
        player.play(&mut canvas, 0, 0, t0);
        player.play(&mut canvas, 0, 0, t0 + Duration::from_millis(15));
        assert_eq!(player.current_frame(), 1);

        // Debounce: re-show keeps the frame position.
        assert!(player.show("icon", &library));
        assert_eq!(player.current_frame(), 1);
    }

    #[test]
    fn unknown_animation_keeps_the_previous_one() {
        let library = library_with("icon", 1, 0);
        let mut player = FramePlayer::new();
        assert!(player.show("icon", &library));
        assert!(!player.show("missing", &library));

        let mut canvas = FrameBuffer::new(32, 8, MatrixLayout::TiledRows);
        player.play(&mut canvas, 0, 0, Instant::now());
        assert_eq!(canvas.get(0, 0), Rgb::new(1, 0, 0));
    }

    #[test]
    fn blits_at_offset_and_clips() {
        let library = library_with("icon", 1, 0);
        let mut canvas = FrameBuffer::new(32, 8, MatrixLayout::TiledRows);
        let mut player = FramePlayer::new();
        player.show("icon", &library);
        player.play(&mut canvas, 31, 7, Instant::now());

        assert_eq!(canvas.get(31, 7), Rgb::new(1, 0, 0));
        // The other three pixels fall off the matrix and are dropped.
    }
}
