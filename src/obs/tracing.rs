// self
use crate::{
	_prelude::*,
	obs::{GateStage, StageVerdict, SweepKind},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedGate<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedGate<F> = F;

/// A span wrapping one trip through the gate.
#[derive(Clone, Debug)]
pub struct GateSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GateSpan {
	/// Creates a new span tagged with the route label.
	pub fn new(route: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("oauth2_admission.gate", route, stage = tracing::field::Empty);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = route;

			Self {}
		}
	}

	/// Records the stage that ended the trip.
	pub fn record_stage(&self, stage: GateStage) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("stage", stage.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedGate<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a stage that stopped a request.
pub fn log_stage_stop(stage: GateStage, verdict: StageVerdict, reason: &str) {
	#[cfg(feature = "tracing")]
	{
		let (stage, verdict_label) = (stage.as_str(), verdict.as_str());

		if verdict == StageVerdict::Deny {
			tracing::warn!(stage, verdict = verdict_label, reason, "request denied");
		} else {
			tracing::debug!(stage, verdict = verdict_label, reason, "request stopped");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, verdict, reason);
	}
}

/// Logs an unexpected failure with full detail; callers only ever see an opaque message.
pub fn log_internal_error(error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(kind = error.kind(), error = %error, "internal error");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}

/// Logs a credential store mutation against a fingerprinted tenant.
pub fn log_credential_event(action: &'static str, tenant: &str) {
	#[cfg(feature = "tracing")]
	{
		let tenant = crate::obs::tenant_fingerprint(tenant);

		tracing::info!(action, %tenant, "credential cache updated");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (action, tenant);
	}
}

/// Logs the outcome of one sweep pass.
pub fn log_sweep(kind: SweepKind, removed: usize) {
	#[cfg(feature = "tracing")]
	{
		if removed > 0 {
			tracing::info!(task = kind.as_str(), removed, "sweep evicted entries");
		} else {
			tracing::trace!(task = kind.as_str(), "sweep found nothing to evict");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, removed);
	}
}
