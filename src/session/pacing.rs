//! Randomized pauses between browser actions

use rand::Rng;
use std::time::Duration;

use crate::config::{DelayBounds, DelayRange};

/// Which kind of action just happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Navigation,
    Card,
    PostClick,
    Back,
    Cookie,
    Keystroke,
}

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    bounds: DelayBounds,
}

impl Pacing {
    #[must_use]
    pub fn new(bounds: DelayBounds) -> Self {
        Self { bounds }
    }

    /// Zero-length pauses
    #[must_use]
    pub fn none() -> Self {
        Self::new(DelayBounds::none())
    }

    fn range(&self, pace: Pace) -> DelayRange {
        match pace {
            Pace::Navigation => self.bounds.navigation,
            Pace::Card => self.bounds.card,
            Pace::PostClick => self.bounds.post_click,
            Pace::Back => self.bounds.back,
            Pace::Cookie => self.bounds.cookie,
            Pace::Keystroke => self.bounds.keystroke,
        }
    }

    /// Draw a duration inside the bounds for `pace`.
    #[must_use]
    pub fn sample(&self, pace: Pace) -> Duration {
        let range = self.range(pace);
        if range.max_ms <= range.min_ms {
            return Duration::from_millis(range.min_ms);
        }
        // ThreadRng is !Send; never hold it across an await
        let ms = rand::rng().random_range(range.min_ms..=range.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self, pace: Pace) {
        let delay = self.sample(pace);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_inside_bounds() {
        let pacing = Pacing::new(DelayBounds::default());
        for _ in 0..200 {
            let d = pacing.sample(Pace::Back);
            assert!(d >= Duration::from_millis(3_000));
            assert!(d <= Duration::from_millis(5_000));
        }
    }

    #[test]
    fn none_never_sleeps() {
        let pacing = Pacing::none();
        assert!(pacing.sample(Pace::Navigation).is_zero());
        assert!(pacing.sample(Pace::Keystroke).is_zero());
    }
}
