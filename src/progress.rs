//! Migration progress reporting.
//!
//! The copy loop produces [`ProgressEvent`]s into a bounded queue; a
//! dedicated consumer thread drains the queue into a [`ProgressSink`]. The
//! producer only blocks when the queue is full, and every event has been
//! delivered by the time [`with_progress`] returns.

use crate::output::OutputFormatter;
use indicatif::ProgressBar;
use std::sync::mpsc::{self, SyncSender};
use std::thread;

/// How many events may be waiting for the consumer before the producer blocks.
pub const PROGRESS_QUEUE_CAPACITY: usize = 64;

/// Snapshot of a running migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationProgress {
    pub items_total: u64,
    pub items_completed: u64,
}

impl MigrationProgress {
    /// Completed share in percent, 100 for an empty tree.
    pub fn percent(&self) -> f64 {
        if self.items_total == 0 {
            return 100.0;
        }
        self.items_completed as f64 * 100.0 / self.items_total as f64
    }
}

/// What travels over the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    Started { items_total: u64 },
    Advanced(MigrationProgress),
    Finished { succeeded: bool },
}

/// Renders progress. Runs on the consumer thread.
pub trait ProgressSink {
    /// Called once, before any item is copied.
    fn start(&mut self, items_total: u64);

    /// Called once per completed item.
    fn advance(&mut self, progress: MigrationProgress);

    /// Called when the copy phase ends, successfully or not.
    fn finish(&mut self, succeeded: bool);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn start(&mut self, _items_total: u64) {}
    fn advance(&mut self, _progress: MigrationProgress) {}
    fn finish(&mut self, _succeeded: bool) {}
}

/// Draws a terminal progress bar.
#[derive(Debug, Default)]
pub struct ProgressBarSink {
    bar: Option<ProgressBar>,
}

impl ProgressSink for ProgressBarSink {
    fn start(&mut self, items_total: u64) {
        let bar = OutputFormatter::create_progress_bar(items_total);
        bar.set_message("copying archive");
        self.bar = Some(bar);
    }

    fn advance(&mut self, progress: MigrationProgress) {
        if let Some(bar) = &self.bar {
            bar.set_position(progress.items_completed);
        }
    }

    fn finish(&mut self, succeeded: bool) {
        if let Some(bar) = self.bar.take() {
            if succeeded {
                bar.finish_with_message("copy complete");
            } else {
                bar.abandon_with_message("copy failed");
            }
        }
    }
}

/// Producer side of the queue, handed to the copy loop.
pub struct ProgressSender {
    tx: SyncSender<ProgressEvent>,
    progress: MigrationProgress,
    disconnected: bool,
}

impl ProgressSender {
    fn new(tx: SyncSender<ProgressEvent>) -> Self {
        Self {
            tx,
            progress: MigrationProgress::default(),
            disconnected: false,
        }
    }

    /// Announces the total number of items.
    pub fn start(&mut self, items_total: u64) {
        self.progress = MigrationProgress {
            items_total,
            items_completed: 0,
        };
        self.send(ProgressEvent::Started { items_total });
    }

    /// Records one more completed item.
    pub fn item_completed(&mut self) {
        self.progress.items_completed += 1;
        self.send(ProgressEvent::Advanced(self.progress));
    }

    /// Ends the copy phase.
    pub fn finish(&mut self, succeeded: bool) {
        self.send(ProgressEvent::Finished { succeeded });
    }

    /// Progress as seen by the producer.
    pub fn progress(&self) -> MigrationProgress {
        self.progress
    }

    fn send(&mut self, event: ProgressEvent) {
        if self.disconnected {
            return;
        }
        // Blocks while the queue is full.
        if self.tx.send(event).is_err() {
            tracing::warn!("progress consumer stopped, further progress is not displayed");
            self.disconnected = true;
        }
    }
}

/// Runs `work` with a [`ProgressSender`] whose events are rendered into
/// `sink` on a separate thread.
///
/// Returns once `work` has finished and the consumer has drained the queue.
pub fn with_progress<S, F, R>(sink: &mut S, work: F) -> R
where
    S: ProgressSink + Send + ?Sized,
    F: FnOnce(&mut ProgressSender) -> R,
{
    let (tx, rx) = mpsc::sync_channel(PROGRESS_QUEUE_CAPACITY);

    thread::scope(|scope| {
        scope.spawn(move || {
            for event in rx {
                match event {
                    ProgressEvent::Started { items_total } => sink.start(items_total),
                    ProgressEvent::Advanced(progress) => sink.advance(progress),
                    ProgressEvent::Finished { succeeded } => sink.finish(succeeded),
                }
            }
        });

        let mut sender = ProgressSender::new(tx);
        let result = work(&mut sender);
        // Closing the queue ends the consumer loop; the scope joins it.
        drop(sender);
        result
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Collects every event for inspection.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub events: Vec<ProgressEvent>,
    }

    impl ProgressSink for RecordingSink {
        fn start(&mut self, items_total: u64) {
            self.events.push(ProgressEvent::Started { items_total });
        }

        fn advance(&mut self, progress: MigrationProgress) {
            self.events.push(ProgressEvent::Advanced(progress));
        }

        fn finish(&mut self, succeeded: bool) {
            self.events.push(ProgressEvent::Finished { succeeded });
        }
    }

    #[test]
    fn test_events_arrive_in_order() {
        let mut sink = RecordingSink::default();

        let returned = with_progress(&mut sink, |progress| {
            progress.start(3);
            for _ in 0..3 {
                progress.item_completed();
            }
            progress.finish(true);
            progress.progress()
        });

        assert_eq!(
            returned,
            MigrationProgress {
                items_total: 3,
                items_completed: 3
            }
        );
        assert_eq!(sink.events.len(), 5);
        assert_eq!(sink.events[0], ProgressEvent::Started { items_total: 3 });
        assert_eq!(
            sink.events[3],
            ProgressEvent::Advanced(MigrationProgress {
                items_total: 3,
                items_completed: 3
            })
        );
        assert_eq!(sink.events[4], ProgressEvent::Finished { succeeded: true });
    }

    #[test]
    fn test_more_events_than_queue_capacity() {
        let mut sink = RecordingSink::default();
        let total = (PROGRESS_QUEUE_CAPACITY * 4) as u64;

        with_progress(&mut sink, |progress| {
            progress.start(total);
            for _ in 0..total {
                progress.item_completed();
            }
        });

        let advanced = sink
            .events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Advanced(_)))
            .count();
        assert_eq!(advanced as u64, total);
    }

    #[test]
    fn test_percent() {
        let half = MigrationProgress {
            items_total: 4,
            items_completed: 2,
        };
        assert_eq!(half.percent(), 50.0);
        assert_eq!(MigrationProgress::default().percent(), 100.0);
    }
}
