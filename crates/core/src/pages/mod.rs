pub mod font;

use std::time::Instant;

use crate::{
    audio::{SpectrumRead, SpectrumSlot, SPECTRUM_BANDS},
    config::ConfigSnapshot,
    matrix::{FrameBuffer, Rgb},
    player::{AnimationLibrary, FramePlayer},
    scheduler::UiState,
    sensors::EnvReadings,
    Result,
};

/// Everything a draw callback may look at, snapshotted for one tick.
/// Configuration arrives as a versioned snapshot instead of globals so a
/// reconfiguration mid-rotation can never produce a torn read.
pub struct DrawContext<'a> {
    pub state: &'a UiState,
    pub config: &'a ConfigSnapshot,
    pub readings: &'a EnvReadings,
    pub animations: &'a AnimationLibrary,
    pub now: Instant,
}

/// Page draw callback: canvas, context, pixel offset, icon player.
pub type DrawFn = Box<dyn FnMut(&mut FrameBuffer, &DrawContext, i16, i16, &mut FramePlayer)>;

/// Overlay draw callback; overlays are composed on top of whatever page
/// content is visible and never scroll with it.
pub type OverlayFn = Box<dyn FnMut(&mut FrameBuffer, &DrawContext, &mut FramePlayer)>;

/// One selectable full-screen content unit.
pub struct PageDescriptor {
    pub name: String,
    pub draw: DrawFn,
    pub enabled: bool,
    pub position: i32,
    /// Dwell time in milliseconds; 0 uses the global default.
    pub duration_ms: u16,
}

impl PageDescriptor {
    pub fn new(name: impl Into<String>, draw: DrawFn) -> Self {
        Self {
            name: name.into(),
            draw,
            enabled: true,
            position: 0,
            duration_ms: 0,
        }
    }

    pub fn at(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    pub fn shown(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn lasting(mut self, duration_ms: u16) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Ordered page collection. Rebuilt wholesale whenever the configuration
/// layer changes anything; the enabled-index cache is refreshed on
/// rebuild only, so ticks never pay for an O(n) scan.
#[derive(Default)]
pub struct PageRegistry {
    pages: Vec<PageDescriptor>,
    enabled: Vec<usize>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the full page list, sorted by position.
    pub fn set_pages(&mut self, mut pages: Vec<PageDescriptor>) {
        pages.sort_by_key(|page| page.position);
        self.pages = pages;
        self.rebuild_enabled_cache();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    /// Indices of enabled pages, in rotation order.
    pub fn enabled_indices(&self) -> &[usize] {
        &self.enabled
    }

    pub fn get(&self, index: usize) -> Option<&PageDescriptor> {
        self.pages.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PageDescriptor> {
        self.pages.get_mut(index)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        for page in &mut self.pages {
            if page.name == name {
                page.enabled = enabled;
            }
        }
        self.rebuild_enabled_cache();
    }

    /// Applies a visibility update from the control boundary, a JSON
    /// array of `{"name": ..., "show": ...}` objects. Unknown names are
    /// ignored; a missing `show` defaults to visible.
    pub fn apply_visibility_json(&mut self, json: &str) -> Result<()> {
        let doc: serde_json::Value = serde_json::from_str(json)?;
        if let Some(entries) = doc.as_array() {
            for entry in entries {
                let Some(name) = entry.get("name").and_then(|v| v.as_str()) else {
                    continue;
                };
                let show = entry.get("show").and_then(|v| v.as_bool()).unwrap_or(true);
                for page in &mut self.pages {
                    if page.name == name {
                        page.enabled = show;
                    }
                }
            }
        }
        self.rebuild_enabled_cache();
        Ok(())
    }

    fn rebuild_enabled_cache(&mut self) {
        self.enabled = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, page)| page.enabled)
            .map(|(index, _)| index)
            .collect();
    }
}

/// The device's built-in page set, in default rotation order.
pub fn native_pages() -> Vec<PageDescriptor> {
    vec![
        PageDescriptor::new("time", Box::new(time_page)).at(0),
        PageDescriptor::new("date", Box::new(date_page)).at(1),
        PageDescriptor::new("temp", Box::new(temp_page)).at(2),
        PageDescriptor::new("hum", Box::new(hum_page)).at(3),
        PageDescriptor::new("weather", Box::new(weather_page)).at(4),
    ]
}

/// The 8x8 icon occupies the left edge; text starts after a 2px gap.
const TEXT_AREA_X: i16 = 10;

fn draw_icon_and_text(
    canvas: &mut FrameBuffer,
    ctx: &DrawContext,
    x: i16,
    y: i16,
    player: &mut FramePlayer,
    icon: &str,
    text: &str,
) {
    let color = ctx.config.pages.text_color;
    let text_width = font::text_width(text);
    let area_width = canvas.width() as i16 - TEXT_AREA_X;

    if text_width <= area_width && player.show(icon, ctx.animations) {
        player.play(canvas, x, y, ctx.now);
        let text_x = TEXT_AREA_X + (area_width - text_width) / 2;
        font::draw_text(canvas, text_x + x, y + 1, text, color);
    } else {
        let text_x = (canvas.width() as i16 - text_width) / 2;
        font::draw_text(canvas, text_x + x, y + 1, text, color);
    }
}

fn weekday_bar(canvas: &mut FrameBuffer, ctx: &DrawContext, x: i16, y: i16) {
    let pages = &ctx.config.pages;
    if !pages.show_weekday {
        return;
    }
    let weekday = ctx.readings.clock.weekday as usize % 7;
    let active = if pages.start_on_monday {
        weekday
    } else {
        (weekday + 1) % 7
    };
    for i in 0..7 {
        let color = if i == active {
            pages.weekday_active_color
        } else {
            pages.weekday_inactive_color
        };
        canvas.draw_hline(TEXT_AREA_X + (i as i16) * 3 + x, y + 7, 2, color);
    }
}

fn time_page(
    canvas: &mut FrameBuffer,
    ctx: &DrawContext,
    x: i16,
    y: i16,
    player: &mut FramePlayer,
) {
    let clock = &ctx.readings.clock;
    let mut text = format!("{:02}:{:02}", clock.hour, clock.minute);
    // The separator blinks on odd seconds.
    if clock.second % 2 == 1 {
        text = text.replace(':', " ");
    }
    draw_icon_and_text(canvas, ctx, x, y, player, "time", &text);
    weekday_bar(canvas, ctx, x, y);
}

fn date_page(
    canvas: &mut FrameBuffer,
    ctx: &DrawContext,
    x: i16,
    y: i16,
    player: &mut FramePlayer,
) {
    let clock = &ctx.readings.clock;
    let text = format!("{:02}.{:02}.", clock.day, clock.month);
    draw_icon_and_text(canvas, ctx, x, y, player, "date", &text);
    weekday_bar(canvas, ctx, x, y);
}

fn temp_page(
    canvas: &mut FrameBuffer,
    ctx: &DrawContext,
    x: i16,
    y: i16,
    player: &mut FramePlayer,
) {
    let text = match ctx.readings.indoor_temp {
        Some(temp) => format!("{temp:.1}°C"),
        None => "--".to_string(),
    };
    draw_icon_and_text(canvas, ctx, x, y, player, "temp", &text);
}

fn hum_page(
    canvas: &mut FrameBuffer,
    ctx: &DrawContext,
    x: i16,
    y: i16,
    player: &mut FramePlayer,
) {
    let text = match ctx.readings.indoor_hum {
        Some(hum) => format!("{hum:.0}%"),
        None => "--".to_string(),
    };
    draw_icon_and_text(canvas, ctx, x, y, player, "hum", &text);
}

fn weather_page(
    canvas: &mut FrameBuffer,
    ctx: &DrawContext,
    x: i16,
    y: i16,
    player: &mut FramePlayer,
) {
    let text = match &ctx.readings.weather {
        Some(weather) => format!("{:.0}°C", weather.temperature),
        None => "--".to_string(),
    };
    draw_icon_and_text(canvas, ctx, x, y, player, "weather", &text);
}

/// Builds the audio spectrum overlay. The overlay polls the worker's
/// slot without blocking; while the producer holds the lock the
/// previous bands are re-drawn, so contention shows as a held frame
/// rather than a glitch.
pub fn spectrum_overlay(slot: SpectrumSlot) -> OverlayFn {
    let mut held = [0u8; SPECTRUM_BANDS];
    Box::new(move |canvas, _ctx, _player| {
        if let SpectrumRead::Fresh(bands) = slot.try_read() {
            held = bands;
        }
        let height = canvas.height() as i16;
        for x in 0..canvas.width() {
            let band = x * SPECTRUM_BANDS / canvas.width();
            let bar = (held[band] as i16 * height + 255) / 256;
            for dy in 0..bar {
                let y = height - 1 - dy;
                let color = match dy {
                    d if d >= height - 2 => Rgb::new(220, 40, 40),
                    d if d >= height / 2 => Rgb::new(220, 180, 0),
                    _ => Rgb::new(0, 180, 60),
                };
                canvas.set(x as i16, y, color);
            }
        }
    })
}
