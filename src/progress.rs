//! Time-indexed progress messages shown while a synthesis call is in flight.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Default gap between messages.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default message sequence, from first to last.
pub const DEFAULT_MESSAGES: [&str; 5] = [
    "Initializing the creative process...",
    "Gathering inspiration from the digital ether...",
    "Mixing colors in the virtual palette...",
    "Bringing your imagination to life...",
    "Adding final touches to your masterpiece...",
];

/// How often the async driver re-checks the clock.
const TICK: Duration = Duration::from_millis(250);

/// Produces the latest applicable status message for the time elapsed since
/// a turn started.
///
/// The schedule is kept sorted by offset and the narrator remembers the last
/// index it reported, so the message index never moves backwards within a
/// turn. Polling is cheap and never sleeps.
#[derive(Debug, Clone)]
pub struct ProgressNarrator {
    schedule: Vec<(Duration, String)>,
    started: Instant,
    reported: Option<usize>,
}

impl Default for ProgressNarrator {
    fn default() -> Self {
        Self::with_interval(DEFAULT_MESSAGES, DEFAULT_INTERVAL)
    }
}

impl ProgressNarrator {
    /// Creates a narrator from explicit `(offset, message)` pairs.
    pub fn new<I, S>(schedule: I) -> Self
    where
        I: IntoIterator<Item = (Duration, S)>,
        S: Into<String>,
    {
        let mut schedule: Vec<(Duration, String)> = schedule
            .into_iter()
            .map(|(offset, msg)| (offset, msg.into()))
            .collect();
        schedule.sort_by_key(|(offset, _)| *offset);
        Self {
            schedule,
            started: Instant::now(),
            reported: None,
        }
    }

    /// Creates a narrator that advances one message every `interval`.
    pub fn with_interval<I, S>(messages: I, interval: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            messages
                .into_iter()
                .enumerate()
                .map(|(i, msg)| (offset_for(interval, i), msg)),
        )
    }

    /// Resets the start time and forgets what was reported.
    pub fn restart(&mut self, at: Instant) {
        self.started = at;
        self.reported = None;
    }

    /// Index of the message that applies after `elapsed`.
    pub fn index_at(&self, elapsed: Duration) -> Option<usize> {
        self.schedule
            .iter()
            .rposition(|(offset, _)| *offset <= elapsed)
    }

    /// Message that applies after `elapsed`.
    pub fn message_at(&self, elapsed: Duration) -> Option<&str> {
        self.index_at(elapsed)
            .map(|i| self.schedule[i].1.as_str())
    }

    /// Returns the current message if it differs from the last one reported.
    pub fn poll(&mut self, now: Instant) -> Option<&str> {
        let elapsed = now.saturating_duration_since(self.started);
        let index = self.index_at(elapsed)?;
        if self.reported.is_some_and(|last| index <= last) {
            return None;
        }
        self.reported = Some(index);
        Some(self.schedule[index].1.as_str())
    }

    /// Current message, never earlier than one already reported.
    pub fn current(&self) -> Option<&str> {
        let elapsed = Instant::now().saturating_duration_since(self.started);
        let index = match (self.index_at(elapsed), self.reported) {
            (Some(now), Some(last)) => now.max(last),
            (now, last) => now.or(last)?,
        };
        Some(self.schedule[index].1.as_str())
    }

    /// True once the last message has been reported.
    pub fn is_finished(&self) -> bool {
        match self.reported {
            Some(last) => last + 1 >= self.schedule.len(),
            None => self.schedule.is_empty(),
        }
    }

    /// Publishes messages into `tx` as they become due.
    ///
    /// Driven by timer ticks, so it can share a task with the synthesis call
    /// via `select!`. Returns when the schedule is exhausted or every receiver
    /// is gone; dropping the future stops narration.
    pub async fn run(mut self, tx: &watch::Sender<String>) {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Some(msg) = self.poll(Instant::now()) {
                tracing::debug!(status = msg, "progress");
                tx.send_replace(msg.to_string());
            }
            if self.is_finished() || tx.is_closed() {
                return;
            }
        }
    }
}

/// `interval * index`, saturating at `Duration::MAX`.
fn offset_for(interval: Duration, index: usize) -> Duration {
    u32::try_from(index)
        .ok()
        .and_then(|i| interval.checked_mul(i))
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_at_boundaries() {
        let narrator = ProgressNarrator::default();
        assert_eq!(narrator.message_at(Duration::ZERO), Some(DEFAULT_MESSAGES[0]));
        assert_eq!(
            narrator.message_at(Duration::from_millis(4999)),
            Some(DEFAULT_MESSAGES[0])
        );
        assert_eq!(
            narrator.message_at(Duration::from_secs(5)),
            Some(DEFAULT_MESSAGES[1])
        );
        assert_eq!(
            narrator.message_at(Duration::from_secs(19)),
            Some(DEFAULT_MESSAGES[3])
        );
        assert_eq!(
            narrator.message_at(Duration::from_secs(600)),
            Some(DEFAULT_MESSAGES[4])
        );
    }

    #[test]
    fn test_unsorted_schedule_is_ordered() {
        let narrator = ProgressNarrator::new([
            (Duration::from_secs(10), "late"),
            (Duration::ZERO, "early"),
        ]);
        assert_eq!(narrator.message_at(Duration::from_secs(1)), Some("early"));
        assert_eq!(narrator.message_at(Duration::from_secs(11)), Some("late"));
    }

    #[test]
    fn test_empty_schedule() {
        let narrator = ProgressNarrator::new(Vec::<(Duration, String)>::new());
        assert_eq!(narrator.message_at(Duration::from_secs(3)), None);
        assert!(narrator.is_finished());
    }

    #[test]
    fn test_poll_never_regresses() {
        let mut narrator = ProgressNarrator::default();
        let t0 = Instant::now();
        narrator.restart(t0);

        assert_eq!(narrator.poll(t0), Some(DEFAULT_MESSAGES[0]));
        assert_eq!(narrator.poll(t0 + Duration::from_secs(1)), None);
        assert_eq!(
            narrator.poll(t0 + Duration::from_secs(11)),
            Some(DEFAULT_MESSAGES[2])
        );
        // an earlier instant must not move the narrator back
        assert_eq!(narrator.poll(t0 + Duration::from_secs(6)), None);
        assert_eq!(narrator.poll(t0), None);
    }

    #[test]
    fn test_restart_resets_reporting() {
        let mut narrator = ProgressNarrator::default();
        let t0 = Instant::now();
        narrator.restart(t0);
        narrator.poll(t0 + Duration::from_secs(30));
        assert!(narrator.is_finished());

        let t1 = t0 + Duration::from_secs(60);
        narrator.restart(t1);
        assert!(!narrator.is_finished());
        assert_eq!(narrator.poll(t1), Some(DEFAULT_MESSAGES[0]));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let narrator = ProgressNarrator::with_interval(DEFAULT_MESSAGES, Duration::MAX);
        assert_eq!(narrator.message_at(Duration::ZERO), Some(DEFAULT_MESSAGES[0]));
        assert_eq!(
            narrator.message_at(Duration::from_secs(u64::MAX)),
            Some(DEFAULT_MESSAGES[0])
        );
        assert_eq!(narrator.message_at(Duration::MAX), Some(DEFAULT_MESSAGES[4]));
    }

    #[test]
    fn test_current_never_earlier_than_reported() {
        let mut narrator = ProgressNarrator::default();
        let t0 = Instant::now();
        narrator.restart(t0);
        assert_eq!(narrator.current(), Some(DEFAULT_MESSAGES[0]));

        // a poll from the future moves the narrator ahead of the wall clock
        narrator.poll(t0 + Duration::from_secs(16));
        assert_eq!(narrator.current(), Some(DEFAULT_MESSAGES[3]));

        // restarting later than now: the clock says nothing yet, the report wins
        let mut ahead = ProgressNarrator::default();
        let later = Instant::now() + Duration::from_secs(3600);
        ahead.restart(later);
        assert_eq!(ahead.current(), Some(DEFAULT_MESSAGES[0]));
        ahead.poll(later + Duration::from_secs(5));
        assert_eq!(ahead.current(), Some(DEFAULT_MESSAGES[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_in_order() {
        let narrator = ProgressNarrator::with_interval(["a", "b", "c"], Duration::from_secs(5));
        let (tx, mut rx) = watch::channel(String::new());
        let driver = tokio::spawn(async move { narrator.run(&tx).await });

        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow_and_update().clone());
        }
        driver.await.unwrap();

        assert_eq!(seen.last().map(String::as_str), Some("c"));
        let order: Vec<usize> = seen
            .iter()
            .map(|m| ["a", "b", "c"].iter().position(|x| x == m).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_receiver_dropped() {
        let narrator = ProgressNarrator::default();
        let (tx, rx) = watch::channel(String::new());
        drop(rx);
        // completes instead of ticking forever
        narrator.run(&tx).await;
    }
}
