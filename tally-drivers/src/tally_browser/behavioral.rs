use anyhow::Result;
use fantoccini::elements::Element;
use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
/// Produces human-like delays and typing behavior to reduce automation signals.
pub struct BehavioralEngine {}

impl BehavioralEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Pick a duration uniformly from `min..=max` milliseconds.
    ///
    /// An inverted range collapses to `min`.
    pub fn pick_delay(&self, min: u64, max: u64) -> Duration {
        if min >= max {
            return Duration::from_millis(min);
        }
        let mut rng = OsRng;
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        let pause = self.pick_delay(min, max);
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }

    /// Sleep for a random duration within `[min, max]`.
    pub async fn random_pause(&self, min: Duration, max: Duration) -> Duration {
        let pause = self.pick_delay(min.as_millis() as u64, max.as_millis() as u64);
        if !pause.is_zero() {
            sleep(pause).await;
        }
        pause
    }

    /// Type the provided text with small random delays between characters.
    pub async fn type_text_human_like(&self, element: &Element, text: &str) -> Result<()> {
        for ch in text.chars() {
            element.send_keys(&ch.to_string()).await?;
            self.random_delay(30, 150).await;
        }
        Ok(())
    }
}
