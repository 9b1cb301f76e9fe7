//! Species carousel
//!
//! Cyclic slide rotation over the registry's species, with manual navigation,
//! a transition lockout and an autoplay task. Presentation only; nothing in
//! the detection pipeline depends on it.

use crate::models::SpeciesRegistry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wildwatch_common::{EventBus, HazardLevel, WildwatchEvent};

pub const DEFAULT_AUTOPLAY: Duration = Duration::from_millis(6000);
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CarouselError {
    #[error("Slide index {index} out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Carousel has no slides")]
    Empty,
}

/// One carousel slide
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub label: String,
    pub title: String,
    pub description: String,
    pub hazard_level: HazardLevel,
    pub image_url: String,
}

/// Serializable carousel snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarouselView {
    pub index: usize,
    pub len: usize,
    pub slide: Option<Slide>,
    pub transitioning: bool,
}

/// Result of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(usize),
    /// A transition was still running, or the target slide is already shown
    Ignored,
}

pub struct Carousel {
    slides: Vec<Slide>,
    index: usize,
    transition: Duration,
    transition_started: Option<Instant>,
    event_bus: EventBus,
}

impl Carousel {
    /// One slide per registry record, in registration order
    pub fn from_registry(registry: &SpeciesRegistry, transition: Duration, event_bus: EventBus) -> Self {
        let slides = registry
            .iter()
            .map(|r| Slide {
                label: r.label.clone(),
                title: r.title.clone(),
                description: r.description.clone(),
                hazard_level: r.hazard_level,
                image_url: r.image_url.clone(),
            })
            .collect();

        Self {
            slides,
            index: 0,
            transition,
            transition_started: None,
            event_bus,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn current(&self) -> Option<&Slide> {
        self.slides.get(self.index)
    }

    pub fn view(&self) -> CarouselView {
        CarouselView {
            index: self.index,
            len: self.slides.len(),
            slide: self.current().cloned(),
            transitioning: self.is_transitioning(Instant::now()),
        }
    }

    pub fn next(&mut self) -> Result<Navigation, CarouselError> {
        self.next_at(Instant::now())
    }

    pub fn previous(&mut self) -> Result<Navigation, CarouselError> {
        self.previous_at(Instant::now())
    }

    pub fn select(&mut self, index: usize) -> Result<Navigation, CarouselError> {
        self.select_at(index, Instant::now())
    }

    /// Jump to a detected species' slide, regardless of any running transition
    ///
    /// Returns None when no slide carries `label`.
    pub fn sync_to_label(&mut self, label: &str) -> Option<usize> {
        let target = self.slides.iter().position(|s| s.label == label)?;
        self.move_to(target, Instant::now());
        Some(target)
    }

    fn next_at(&mut self, now: Instant) -> Result<Navigation, CarouselError> {
        let len = self.non_empty_len()?;
        self.navigate((self.index + 1) % len, now)
    }

    fn previous_at(&mut self, now: Instant) -> Result<Navigation, CarouselError> {
        let len = self.non_empty_len()?;
        self.navigate((self.index + len - 1) % len, now)
    }

    fn select_at(&mut self, index: usize, now: Instant) -> Result<Navigation, CarouselError> {
        let len = self.non_empty_len()?;
        if index >= len {
            return Err(CarouselError::IndexOutOfRange { index, len });
        }
        if index == self.index {
            return Ok(Navigation::Ignored);
        }
        self.navigate(index, now)
    }

    fn navigate(&mut self, target: usize, now: Instant) -> Result<Navigation, CarouselError> {
        if self.is_transitioning(now) {
            debug!(target, "Carousel navigation ignored during transition");
            return Ok(Navigation::Ignored);
        }
        self.move_to(target, now);
        Ok(Navigation::Moved(target))
    }

    fn move_to(&mut self, target: usize, now: Instant) {
        self.index = target;
        self.transition_started = Some(now);

        if let Some(slide) = self.slides.get(target) {
            self.event_bus.emit_lossy(WildwatchEvent::CarouselAdvanced {
                index: target,
                label: slide.label.clone(),
                timestamp: Utc::now(),
            });
        }
    }

    fn is_transitioning(&self, now: Instant) -> bool {
        self.transition_started
            .map(|started| now.saturating_duration_since(started) < self.transition)
            .unwrap_or(false)
    }

    fn non_empty_len(&self) -> Result<usize, CarouselError> {
        match self.slides.len() {
            0 => Err(CarouselError::Empty),
            len => Ok(len),
        }
    }
}

/// Advance the carousel every `period` until `token` is cancelled
pub fn spawn_autoplay(
    carousel: Arc<Mutex<Carousel>>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval_at(tokio::time::Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = period.as_millis() as u64, "Carousel autoplay started");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Carousel autoplay stopped");
                    break;
                }
                _ = tick.tick() => {
                    let mut carousel = carousel.lock().await;
                    if let Ok(Navigation::Moved(index)) = carousel.next() {
                        debug!(index, "Carousel autoplay advanced");
                    }
                }
            }
        }
    })
}
