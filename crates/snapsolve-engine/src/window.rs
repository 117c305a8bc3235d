use crate::config::WindowConfig;

const CONTENT_PADDING: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Position and size bookkeeping for the overlay window.
///
/// Moves step by a tenth of the screen width and are clamped so at most half
/// of the window can leave the screen. Content-driven resizes cap the width at
/// half the screen, or three quarters once a debug answer is showing.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowGeometry {
    screen_width: f64,
    screen_height: f64,
    step: f64,
    bounds: Bounds,
    visible: bool,
    saved: Option<Bounds>,
}

impl WindowGeometry {
    pub fn new(screen_width: f64, screen_height: f64, bounds: Bounds) -> Self {
        Self {
            screen_width,
            screen_height,
            step: (screen_width / 10.0).floor(),
            bounds,
            visible: true,
            saved: None,
        }
    }

    pub fn from_config(config: &WindowConfig) -> Self {
        Self::new(
            config.screen_width,
            config.screen_height,
            Bounds {
                x: 0.0,
                y: 0.0,
                width: config.width,
                height: config.height,
            },
        )
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Position rounded to whole pixels, as a windowing API wants it.
    pub fn position(&self) -> (i32, i32) {
        (self.bounds.x.round() as i32, self.bounds.y.round() as i32)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn move_right(&mut self) {
        let limit = self.screen_width - self.bounds.width / 2.0;
        self.bounds.x = limit.min(self.bounds.x + self.step);
    }

    pub fn move_left(&mut self) {
        let limit = -self.bounds.width / 2.0;
        self.bounds.x = limit.max(self.bounds.x - self.step);
    }

    pub fn move_down(&mut self) {
        let limit = self.screen_height - self.bounds.height / 2.0;
        self.bounds.y = limit.min(self.bounds.y + self.step);
    }

    pub fn move_up(&mut self) {
        let limit = -self.bounds.height / 2.0;
        self.bounds.y = limit.max(self.bounds.y - self.step);
    }

    pub fn set_content_dimensions(&mut self, width: f64, height: f64, has_debugged: bool) {
        let ratio = if has_debugged { 0.75 } else { 0.5 };
        let max_width = (self.screen_width * ratio).floor();
        self.bounds = Bounds {
            x: self.bounds.x.min(self.screen_width - max_width),
            y: self.bounds.y,
            width: (width + CONTENT_PADDING).min(max_width),
            height: height.ceil(),
        };
    }

    pub fn hide(&mut self) {
        if !self.visible {
            return;
        }
        self.saved = Some(self.bounds);
        self.visible = false;
    }

    pub fn show(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.bounds = saved;
        }
        self.visible = true;
    }

    pub fn toggle(&mut self) -> bool {
        if self.visible {
            self.hide();
        } else {
            self.show();
        }
        self.visible
    }
}
