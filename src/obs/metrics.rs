// self
use crate::obs::{GateStage, StageVerdict, SweepKind};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_verdict(stage: GateStage, verdict: StageVerdict) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_admission_gate_total",
			"stage" => stage.as_str(),
			"outcome" => verdict.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, verdict);
	}
}

/// Records how many entries a sweep pass evicted.
pub fn record_sweep(kind: SweepKind, removed: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_admission_sweep_removed_total", "task" => kind.as_str())
			.increment(u64::try_from(removed).unwrap_or(u64::MAX));
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, removed);
	}
}
