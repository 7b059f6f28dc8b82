//! Progress counter for cursor fetches

use kdam::{Animation, Bar, BarExt};

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> Bar {
    kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " fetches"
    )
}

/// Advances a counter every `every` fetches. Disabled when built with `None`.
/// Owned by the coordinating thread.
pub struct FetchProgress {
    bar: Option<Bar>,
    every: u64,
    pending: u64,
}

impl FetchProgress {
    pub fn new(every: Option<u64>) -> Self {
        Self {
            bar: every.map(|_| create_counter("Fetching")),
            every: every.unwrap_or(1).max(1),
            pending: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    /// Fetches counted but not yet shown.
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Fetches shown on the bar so far.
    pub fn shown(&self) -> usize {
        self.bar.as_ref().map_or(0, |bar| bar.counter)
    }

    /// Count one fetch.
    pub fn tick(&mut self) {
        let Some(bar) = &mut self.bar else { return };
        self.pending += 1;
        if self.pending >= self.every {
            let _ = bar.update(self.pending as usize);
            self.pending = 0;
        }
    }

    /// Flush what is pending and end the bar's line.
    pub fn finish(&mut self) {
        let Some(mut bar) = self.bar.take() else { return };
        if self.pending > 0 {
            let _ = bar.update(self.pending as usize);
        }
        let _ = bar.refresh();
        eprintln!();
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_reach_the_bar_every_n_fetches() {
        let mut progress = FetchProgress::new(Some(3));
        for _ in 0..7 {
            progress.tick();
        }
        assert_eq!(progress.shown(), 6);
        assert_eq!(progress.pending(), 1);
    }

    #[test]
    fn disabled_progress_counts_nothing() {
        let mut progress = FetchProgress::disabled();
        progress.tick();
        assert!(!progress.is_enabled());
        assert_eq!(progress.pending(), 0);
    }
}
