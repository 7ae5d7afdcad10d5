use std::time::{Duration, Instant};

pub const STATS_REFRESH: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Inactive,
    Tick,
    /// Time left until the next tick
    Wait(Duration),
}

/// Fixed-period timer polled from the frame loop.
///
/// Ticks as soon as it becomes active, every period while it stays active, and
/// once more when it is switched off.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    last: Option<Instant>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    pub fn is_running(&self) -> bool {
        self.last.is_some()
    }

    pub fn poll(&mut self, now: Instant, active: bool) -> TickAction {
        match (self.last, active) {
            (None, false) => TickAction::Inactive,
            (None, true) => {
                self.last = Some(now);
                TickAction::Tick
            }
            (Some(_), false) => {
                self.last = None;
                TickAction::Tick
            }
            (Some(last), true) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed >= self.period {
                    self.last = Some(now);
                    TickAction::Tick
                } else {
                    TickAction::Wait(self.period - elapsed)
                }
            }
        }
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(STATS_REFRESH)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inactive_never_ticks() {
        let mut ticker = Ticker::default();
        let now = Instant::now();

        assert_eq!(ticker.poll(now, false), TickAction::Inactive);
        assert_eq!(ticker.poll(now + STATS_REFRESH * 3, false), TickAction::Inactive);
        assert!(!ticker.is_running());
    }

    #[test]
    fn test_tick_schedule() {
        let mut ticker = Ticker::default();
        let start = Instant::now();

        assert_eq!(ticker.poll(start, true), TickAction::Tick);
        assert_eq!(
            ticker.poll(start + Duration::from_secs(20), true),
            TickAction::Wait(Duration::from_secs(40))
        );
        assert_eq!(ticker.poll(start + STATS_REFRESH, true), TickAction::Tick);
        assert!(ticker.is_running());

        // switching off ticks once and cancels
        assert_eq!(ticker.poll(start + Duration::from_secs(70), false), TickAction::Tick);
        assert!(!ticker.is_running());
        assert_eq!(
            ticker.poll(start + Duration::from_secs(200), false),
            TickAction::Inactive
        );
    }

    #[test]
    fn test_reactivation_restarts_period() {
        let mut ticker = Ticker::new(Duration::from_secs(10));
        let start = Instant::now();

        ticker.poll(start, true);
        ticker.poll(start + Duration::from_secs(5), false);

        assert_eq!(ticker.poll(start + Duration::from_secs(6), true), TickAction::Tick);
        assert_eq!(
            ticker.poll(start + Duration::from_secs(7), true),
            TickAction::Wait(Duration::from_secs(9))
        );
    }
}
