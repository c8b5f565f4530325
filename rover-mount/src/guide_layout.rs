//! Scale decisions for modal containers whose content would not fit on screen.

use crate::mutation::Tag;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Height reserved for system bars
const SYSTEM_BAR_HEIGHT: f32 = 45.0;
/// Modals closer than this to the top edge get scaled down
const MIN_TOP_DISTANCE: f32 = 30.0;
const MIN_SCALE: f32 = 0.85;
const OVERFLOW_EPSILON: f32 = 0.5;
const CACHE_EPSILON: f32 = 1.0;

/// Scale decision for one modal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleInfo {
    pub scale_factor: f32,
    pub top_distance: f32,
    pub content_height: f32,
    pub screen_height: f32,
    pub needs_scale: bool,
}

impl ScaleInfo {
    fn identity(content_height: f32, top_distance: f32, screen_height: f32) -> Self {
        Self {
            scale_factor: 1.0,
            top_distance,
            content_height,
            screen_height,
            needs_scale: false,
        }
    }
}

struct GuideState {
    scale_factor: f32,
    available_height: f32,
    cache: HashMap<Tag, ScaleInfo>,
    scaled: HashSet<Tag>,
}

pub struct GuideLayoutCache {
    enabled: AtomicBool,
    state: Mutex<GuideState>,
}

impl GuideLayoutCache {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            state: Mutex::new(GuideState {
                scale_factor: 1.0,
                available_height: 0.0,
                cache: HashMap::new(),
                scaled: HashSet::new(),
            }),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Decide how `modal` should be scaled, reusing the cached decision while
    /// content and screen height stay within one unit of it.
    pub fn evaluate(
        &self,
        modal: Tag,
        content_height: f32,
        top_distance: f32,
        screen_height: f32,
    ) -> ScaleInfo {
        if !self.is_enabled() || screen_height <= 0.0 {
            return ScaleInfo::identity(content_height, top_distance, screen_height);
        }

        let mut state = self.state.lock();
        let mut available = screen_height - SYSTEM_BAR_HEIGHT;
        if available <= 0.0 {
            available = screen_height;
        }
        state.available_height = available;

        if let Some(cached) = state.cache.get(&modal).copied() {
            if (content_height - cached.content_height).abs() <= CACHE_EPSILON
                && (screen_height - cached.screen_height).abs() <= CACHE_EPSILON
            {
                state.scale_factor = cached.scale_factor;
                return cached;
            }
            state.cache.remove(&modal);
            state.scaled.remove(&modal);
        }

        let info = if content_height > screen_height + OVERFLOW_EPSILON {
            ScaleInfo {
                scale_factor: (available / content_height).max(MIN_SCALE),
                top_distance,
                content_height,
                screen_height,
                needs_scale: true,
            }
        } else if top_distance < MIN_TOP_DISTANCE && screen_height > top_distance {
            let factor = ((screen_height - MIN_TOP_DISTANCE) / (screen_height - top_distance))
                .min(state.scale_factor)
                .max(MIN_SCALE);
            ScaleInfo {
                scale_factor: factor,
                top_distance,
                content_height,
                screen_height,
                needs_scale: true,
            }
        } else {
            ScaleInfo::identity(content_height, top_distance, screen_height)
        };

        debug!(
            tag = modal.0,
            scale = info.scale_factor,
            needs_scale = info.needs_scale,
            "modal scale evaluated"
        );
        state.scale_factor = info.scale_factor;
        if info.needs_scale {
            state.scaled.insert(modal);
        }
        state.cache.insert(modal, info);
        info
    }

    pub fn cached(&self, modal: Tag) -> Option<ScaleInfo> {
        self.state.lock().cache.get(&modal).copied()
    }

    pub fn is_scaled(&self, modal: Tag) -> bool {
        self.state.lock().scaled.contains(&modal)
    }

    /// Last applied scale factor
    pub fn scale_factor(&self) -> f32 {
        self.state.lock().scale_factor
    }

    /// Screen height minus system bars, from the last evaluation
    pub fn available_height(&self) -> f32 {
        self.state.lock().available_height
    }

    pub fn invalidate(&self, modal: Tag) {
        let mut state = self.state.lock();
        state.cache.remove(&modal);
        state.scaled.remove(&modal);
    }

    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.scaled.clear();
        state.scale_factor = 1.0;
    }
}

impl Default for GuideLayoutCache {
    fn default() -> Self {
        Self::new()
    }
}
