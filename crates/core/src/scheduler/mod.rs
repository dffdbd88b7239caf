use std::time::Instant;

use crate::{
    config::ConfigSnapshot,
    matrix::FrameBuffer,
    pages::{DrawContext, OverlayFn, PageDescriptor, PageRegistry},
    player::{AnimationLibrary, FramePlayer},
    sensors::EnvReadings,
    Result,
};

/// Rotation state: a page is either shown steadily or sliding over to
/// the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageMode {
    #[default]
    Fixed,
    InTransition,
}

/// Public rotation state, owned by the scheduler and mutated once per
/// tick. Draw callbacks get a read-only view.
#[derive(Debug, Clone)]
pub struct UiState {
    pub mode: PageMode,
    pub current_index: usize,
    pub ticks_since_switch: i32,
    pub transition_direction: i8,
    pub manual_override: bool,
    /// Target of the running transition. Set exactly once when the
    /// transition begins and consumed exactly once when it ends.
    pub cached_next_index: Option<usize>,
    pub last_tick: Option<Instant>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            mode: PageMode::Fixed,
            current_index: 0,
            ticks_since_switch: 0,
            transition_direction: 1,
            manual_override: false,
            cached_next_index: None,
            last_tick: None,
        }
    }
}

/// Shared read-only inputs for one render tick, lent by the host.
pub struct RenderEnv<'a> {
    pub config: &'a ConfigSnapshot,
    pub readings: &'a EnvReadings,
    pub animations: &'a AnimationLibrary,
}

/// Advances the page rotation once per tick and renders the active page
/// (or both pages mid-transition) plus the overlay layers into the
/// frame buffer.
pub struct RenderScheduler {
    registry: PageRegistry,
    state: UiState,
    overlays: Vec<OverlayFn>,

    update_interval_ms: f64,
    time_per_page_ms: u16,
    time_per_transition_ms: u16,
    ticks_per_page: i32,
    ticks_per_transition: i32,
    auto_transition: bool,

    /// One-shot manual jump target, consumed by at most one transition.
    pending_jump: Option<usize>,
    last_direction: i8,

    // Independent icon players so the two pages visible during a
    // transition (and the overlays) never disturb each other's
    // image-sequence state.
    player_current: FramePlayer,
    player_next: FramePlayer,
    player_overlay: FramePlayer,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderScheduler {
    pub fn new() -> Self {
        let mut scheduler = Self {
            registry: PageRegistry::new(),
            state: UiState::default(),
            overlays: Vec::new(),
            update_interval_ms: 1000.0 / 30.0,
            time_per_page_ms: 5_000,
            time_per_transition_ms: 500,
            ticks_per_page: 0,
            ticks_per_transition: 0,
            auto_transition: true,
            pending_jump: None,
            last_direction: 1,
            player_current: FramePlayer::new(),
            player_next: FramePlayer::new(),
            player_overlay: FramePlayer::new(),
        };
        scheduler.reload_tick_budgets();
        scheduler
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn update_interval_ms(&self) -> f64 {
        self.update_interval_ms
    }

    // ----- configuration surface ------------------------------------

    pub fn set_target_fps(&mut self, fps: u8) {
        self.set_update_interval_ms(1000.0 / fps.max(1) as f64);
    }

    pub fn set_update_interval_ms(&mut self, interval_ms: f64) {
        self.update_interval_ms = interval_ms.max(1.0);
        self.reload_tick_budgets();
    }

    pub fn set_time_per_page(&mut self, ms: u16) {
        self.time_per_page_ms = ms;
        self.reload_tick_budgets();
    }

    pub fn set_time_per_transition(&mut self, ms: u16) {
        self.time_per_transition_ms = ms;
        self.reload_tick_budgets();
    }

    pub fn set_auto_transition(&mut self, enabled: bool) {
        self.auto_transition = enabled;
    }

    /// Applies the render section of a configuration snapshot.
    pub fn apply_config(&mut self, config: &ConfigSnapshot) {
        self.set_target_fps(config.render.target_fps);
        self.set_time_per_page(config.render.time_per_page_ms);
        self.set_time_per_transition(config.render.time_per_transition_ms);
        self.set_auto_transition(config.render.auto_transition);
    }

    /// Replaces the full page registry. The rotation state is clamped to
    /// the new list; a cached transition target that no longer exists is
    /// dropped so the transition completes on the current page.
    pub fn set_pages(&mut self, pages: Vec<PageDescriptor>) {
        self.registry.set_pages(pages);
        if self.state.current_index >= self.registry.len() {
            self.state.current_index = 0;
        }
        if matches!(self.state.cached_next_index, Some(next) if next >= self.registry.len()) {
            self.state.cached_next_index = None;
        }
        if matches!(self.pending_jump, Some(target) if target >= self.registry.len()) {
            self.pending_jump = None;
        }
        self.reload_tick_budgets();
    }

    pub fn apply_visibility_json(&mut self, json: &str) -> Result<()> {
        self.registry.apply_visibility_json(json)
    }

    pub fn set_overlays(&mut self, overlays: Vec<OverlayFn>) {
        self.overlays = overlays;
    }

    // ----- navigation ------------------------------------------------

    pub fn next_page(&mut self) {
        self.manual_step(1);
    }

    pub fn previous_page(&mut self) {
        self.manual_step(-1);
    }

    fn manual_step(&mut self, direction: i8) {
        if self.state.mode == PageMode::InTransition || self.registry.is_empty() {
            return;
        }
        self.last_direction = self.state.transition_direction;
        self.state.transition_direction = direction;
        self.state.manual_override = true;
        self.begin_transition();
    }

    /// Animates over to a specific page. No-op while a transition is
    /// already running, for the current page, or out of range.
    pub fn transition_to(&mut self, index: usize) {
        if index >= self.registry.len() || self.state.mode == PageMode::InTransition {
            return;
        }
        self.state.ticks_since_switch = 0;
        if index == self.state.current_index {
            return;
        }
        self.pending_jump = Some(index);
        self.last_direction = self.state.transition_direction;
        self.state.transition_direction = if index < self.state.current_index { -1 } else { 1 };
        self.state.manual_override = true;
        self.begin_transition();
    }

    /// Jumps to a page immediately, without animation.
    pub fn switch_to(&mut self, index: usize) {
        if index >= self.registry.len() || index == self.state.current_index {
            return;
        }
        self.state.current_index = index;
        self.state.ticks_since_switch = 0;
        self.state.mode = PageMode::Fixed;
        self.state.cached_next_index = None;
        self.reload_tick_budgets();
    }

    // ----- frame pacing ----------------------------------------------

    /// Drives the scheduler from the host loop. A tick fires once the
    /// time budget for the current frame is used up; the return value is
    /// the remaining budget in milliseconds (a sleep hint; right after a
    /// tick it is the interval minus what the tick itself consumed).
    ///
    /// When the loop falls behind, the lateness in whole intervals is
    /// added to `ticks_since_switch` so the rotation's sense of elapsed
    /// time keeps tracking real time. The arithmetic is deliberately
    /// wide and signed: millisecond lateness can exceed an 8-bit range
    /// within a single slow loop iteration.
    pub fn update(&mut self, canvas: &mut FrameBuffer, now: Instant, env: &RenderEnv) -> i64 {
        let interval = self.update_interval_ms;
        let budget = match self.state.last_tick {
            Some(last) => interval - now.duration_since(last).as_secs_f64() * 1000.0,
            None => 0.0,
        };
        if budget > 0.0 {
            return budget as i64;
        }

        if self.auto_transition && self.state.last_tick.is_some() {
            let late_intervals = (-budget / interval).ceil() as i32;
            self.state.ticks_since_switch += late_intervals;
        }
        self.state.last_tick = Some(now);
        self.tick(canvas, now, env);
        // The sleep hint accounts for the time the tick itself took, so
        // a slow draw does not push the next frame late on top of it.
        let spent = now.elapsed().as_secs_f64() * 1000.0;
        (interval - spent).max(0.0) as i64
    }

    /// One scheduler step: advance the rotation state machine, then
    /// redraw the frame buffer from scratch.
    fn tick(&mut self, canvas: &mut FrameBuffer, now: Instant, env: &RenderEnv) {
        self.state.ticks_since_switch += 1;

        if !self.registry.is_empty() {
            match self.state.mode {
                PageMode::InTransition => {
                    if self.state.ticks_since_switch >= self.ticks_per_transition {
                        self.finish_transition();
                    }
                }
                PageMode::Fixed => {
                    if self.state.manual_override {
                        self.state.transition_direction = self.last_direction;
                        self.state.manual_override = false;
                    }
                    if self.state.ticks_since_switch >= self.ticks_per_page {
                        if self.auto_transition && self.registry.enabled_count() > 1 {
                            self.begin_transition();
                        } else {
                            self.state.ticks_since_switch = 0;
                        }
                    }
                }
            }
        }

        canvas.clear();
        // A registry with no enabled pages renders nothing; overlays
        // stay visible either way.
        if self.registry.enabled_count() > 0 {
            self.draw_page(canvas, now, env);
        }
        self.draw_overlays(canvas, now, env);
    }

    // ----- transitions -----------------------------------------------

    /// Enters `InTransition` and chooses the target exactly once.
    /// Selecting it again later in the same transition would pop a
    /// second manual jump and silently skip past the intended page.
    fn begin_transition(&mut self) {
        self.state.mode = PageMode::InTransition;
        self.state.ticks_since_switch = 0;
        let next = self.select_next();
        self.state.cached_next_index = Some(next);
        tracing::debug!(
            from = self.state.current_index,
            to = next,
            "page transition started"
        );
    }

    /// Consumes the cached target and returns to `Fixed`.
    fn finish_transition(&mut self) {
        self.state.mode = PageMode::Fixed;
        if let Some(next) = self.state.cached_next_index.take() {
            if next < self.registry.len() {
                self.state.current_index = next;
            }
            // Registry shrank mid-transition: hold the current page.
        }
        self.state.ticks_since_switch = 0;
        self.reload_tick_budgets();
    }

    /// Picks the transition target: a queued one-shot manual jump wins,
    /// otherwise step through the enabled pages with wraparound.
    fn select_next(&mut self) -> usize {
        if let Some(target) = self.pending_jump.take() {
            if target < self.registry.len() {
                return target;
            }
        }

        let enabled = self.registry.enabled_indices();
        if enabled.is_empty() {
            // Callers guard empty registries before drawing.
            return 0;
        }
        let position = enabled
            .iter()
            .position(|index| *index == self.state.current_index)
            .unwrap_or(0);
        let step: isize = if self.state.transition_direction >= 0 { 1 } else { -1 };
        let next = (position as isize + enabled.len() as isize + step) as usize % enabled.len();
        enabled[next]
    }

    /// Tick budgets derive from milliseconds so a frame-rate change
    /// keeps wall-clock dwell times stable. The page budget honors the
    /// current page's custom duration when it has one.
    fn reload_tick_budgets(&mut self) {
        let page_ms = match self.registry.get(self.state.current_index) {
            Some(page) if page.duration_ms > 0 => page.duration_ms,
            _ => self.time_per_page_ms,
        };
        self.ticks_per_page = self.ms_to_ticks(page_ms);
        self.ticks_per_transition = self.ms_to_ticks(self.time_per_transition_ms);
    }

    fn ms_to_ticks(&self, ms: u16) -> i32 {
        ((ms as f64 / self.update_interval_ms).round() as i32).max(1)
    }

    // ----- drawing ---------------------------------------------------

    fn draw_page(&mut self, canvas: &mut FrameBuffer, now: Instant, env: &RenderEnv) {
        let ctx = DrawContext {
            state: &self.state,
            config: env.config,
            readings: env.readings,
            animations: env.animations,
            now,
        };

        match self.state.mode {
            PageMode::Fixed => {
                if let Some(page) = self.registry.get_mut(self.state.current_index) {
                    (page.draw)(canvas, &ctx, 0, 0, &mut self.player_current);
                }
            }
            PageMode::InTransition => {
                let progress = (self.state.ticks_since_switch as f32
                    / self.ticks_per_transition.max(1) as f32)
                    .clamp(0.0, 1.0);
                let height = canvas.height() as i16;
                let direction: i16 = if self.state.transition_direction >= 0 { 1 } else { -1 };
                // Vertical slide: the active page moves off one edge
                // while the cached target enters from the other.
                let y = ((height as f32 * progress) as i16) * direction;
                let y_next = y - height * direction;

                if let Some(page) = self.registry.get_mut(self.state.current_index) {
                    (page.draw)(canvas, &ctx, 0, y, &mut self.player_current);
                }
                if let Some(next) = self.state.cached_next_index {
                    if let Some(page) = self.registry.get_mut(next) {
                        (page.draw)(canvas, &ctx, 0, y_next, &mut self.player_next);
                    }
                }
            }
        }
    }

    fn draw_overlays(&mut self, canvas: &mut FrameBuffer, now: Instant, env: &RenderEnv) {
        if self.overlays.is_empty() {
            return;
        }
        let ctx = DrawContext {
            state: &self.state,
            config: env.config,
            readings: env.readings,
            animations: env.animations,
            now,
        };
        for overlay in self.overlays.iter_mut() {
            (overlay)(canvas, &ctx, &mut self.player_overlay);
        }
    }
}
