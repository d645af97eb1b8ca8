//! Relative repeating timer.
//!
//! The compositor and the stats display both run "every N milliseconds", but
//! neither should ever try to catch up after a slow tick: if a tick finishes
//! late, the next one is simply scheduled one period after *that*.  There is
//! no burst of back-to-back ticks and no accumulated drift to pay back.
//!
//! [`RepeatingTimer`] only stores the next deadline.  The session loop asks
//! for it, sleeps until it (see [`sleep_until_opt`]), runs the tick and then
//! re-arms the timer from the current instant.

use std::time::Duration;

use tokio::time::Instant;

/// A timer whose next deadline is always one period after the last re-arm.
#[derive(Debug, Clone)]
pub struct RepeatingTimer {
    period: Duration,
    next: Option<Instant>,
}

impl RepeatingTimer {
    /// Creates a disarmed timer.
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Period derived from a frame rate: `1000 / fps` milliseconds.
    ///
    /// `fps` must be non-zero.
    pub fn from_fps(fps: u32) -> Self {
        Self::new(Duration::from_secs(1) / fps.max(1))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Arms the timer so that it is due at `now`.
    pub fn start_now(&mut self, now: Instant) {
        self.next = Some(now);
    }

    /// Arms the timer one period after `now`.
    pub fn start_after(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }

    /// Schedules the next deadline one period after `now`.
    ///
    /// Called at the end of each tick with the tick's own finishing time,
    /// never with the missed deadline.
    pub fn rearm_from(&mut self, now: Instant) {
        self.start_after(now);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next.is_some_and(|deadline| deadline <= now)
    }
}

/// Sleeps until `deadline`, or forever when there is none.
///
/// Meant as a `tokio::select!` branch: a disarmed timer never fires.
pub async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_from_fps_divides_one_second() {
        let timer = RepeatingTimer::from_fps(15);
        assert_eq!(timer.period(), Duration::from_nanos(66_666_666));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_is_relative_to_tick_end_not_missed_deadline() {
        // Arrange
        let mut timer = RepeatingTimer::new(Duration::from_millis(100));
        let start = Instant::now();
        timer.start_after(start);

        // Act – the tick ran 250 ms late
        let late = start + Duration::from_millis(350);
        assert!(timer.is_due(late));
        timer.rearm_from(late);

        // Assert – next deadline is one period after the late tick, no catch-up
        assert_eq!(timer.deadline(), Some(late + Duration::from_millis(100)));
        assert!(!timer.is_due(late));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_now_is_immediately_due() {
        let mut timer = RepeatingTimer::new(Duration::from_millis(100));
        let now = Instant::now();
        timer.start_now(now);
        assert!(timer.is_due(now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disarms() {
        let mut timer = RepeatingTimer::new(Duration::from_millis(100));
        timer.start_now(Instant::now());
        timer.stop();
        assert_eq!(timer.deadline(), None);
        assert!(!timer.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_none_never_completes() {
        // Arrange
        let mut sleep = task::spawn(sleep_until_opt(None));

        // Act – advance well past any plausible deadline
        tokio::time::advance(Duration::from_secs(3600)).await;

        // Assert
        assert_pending!(sleep.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_some_completes_at_deadline() {
        // Arrange
        let deadline = Instant::now() + Duration::from_millis(66);
        let mut sleep = task::spawn(sleep_until_opt(Some(deadline)));
        assert_pending!(sleep.poll());

        // Act
        tokio::time::advance(Duration::from_millis(66)).await;

        // Assert
        assert!(sleep.is_woken());
        assert_ready!(sleep.poll());
    }
}
