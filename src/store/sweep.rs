//! Cancellable periodic task that runs an eviction pass on a fixed interval.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	sync::oneshot,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	obs::{self, SweepKind},
};

const MIN_PERIOD: StdDuration = StdDuration::from_millis(1);

/// Handle to a running sweep.
///
/// The first pass runs immediately, later passes every `period`. [`SweepTask::stop`] ends the
/// loop and waits for it; dropping the handle without stopping aborts the task so no timer
/// outlives its owner.
#[derive(Debug)]
pub struct SweepTask {
	kind: SweepKind,
	stop: Option<oneshot::Sender<()>>,
	handle: Option<JoinHandle<()>>,
}
impl SweepTask {
	/// Spawns the sweep on the current Tokio runtime.
	pub fn spawn<F>(kind: SweepKind, period: Duration, sweep: F) -> Self
	where
		F: 'static + Send + Fn() -> usize,
	{
		let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
		let period = period.unsigned_abs().max(MIN_PERIOD);
		let handle = tokio::spawn(async move {
			let mut ticker = time::interval(period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					biased;
					_ = &mut stop_rx => break,
					_ = ticker.tick() => {
						let removed = sweep();

						obs::log_sweep(kind, removed);
						obs::record_sweep(kind, removed);
					},
				}
			}
		});

		Self { kind, stop: Some(stop_tx), handle: Some(handle) }
	}

	/// Which sweep this handle controls.
	pub fn kind(&self) -> SweepKind {
		self.kind
	}

	/// Returns `true` while the loop is alive.
	pub fn is_running(&self) -> bool {
		self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
	}

	/// Signals the loop to exit and waits for it.
	pub async fn stop(mut self) {
		if let Some(stop) = self.stop.take() {
			let _ = stop.send(());
		}

		let Some(handle) = self.handle.take() else {
			return;
		};

		if let Err(e) = handle.await {
			let err = Error::internal(format!("{} sweep task failed: {e}", self.kind));

			obs::log_internal_error(&err);
		}
	}
}
impl Drop for SweepTask {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}
}
