//! Ordered, short-circuiting admission pipeline.
//!
//! Each [`Stage`] inspects a [`GateContext`] and either continues or terminates the request.
//! [`Pipeline::run`] folds the stages in order and stops at the first terminal outcome, so no later
//! stage (and never the wrapped handler) observes a request an earlier stage refused.

mod metrics;

pub mod request;
pub mod response;
pub mod stages;

pub use metrics::*;
pub use request::*;
pub use response::*;
pub use stages::*;

// self
use crate::{
	_prelude::*,
	clock::Clock,
	obs::{self, GateSpan, GateStage, StageVerdict},
	policy::Policy,
	rate_limit::RateLimiter,
};

/// One admission check.
pub trait Stage
where
	Self: Debug + Send + Sync,
{
	/// Pipeline position reported in logs and metrics.
	fn kind(&self) -> GateStage;

	/// Evaluates the request, optionally adding response headers to the context.
	fn evaluate(&self, ctx: &mut GateContext) -> StageOutcome;
}

/// Result of evaluating a single stage.
#[derive(Debug)]
pub enum StageOutcome {
	/// Hand the request to the next stage.
	Continue,
	/// Stop here.
	Terminate(Termination),
}
impl StageOutcome {
	/// Terminal rejection.
	pub fn deny(error: Error) -> Self {
		Self::Terminate(Termination::Deny(error))
	}
}

/// Why a stage stopped the request.
#[derive(Debug)]
pub enum Termination {
	/// A preflight was answered; this is not a failure.
	Preflight(GateResponse),
	/// The request was refused.
	Deny(Error),
}
impl Termination {
	/// Verdict label for logs and metrics.
	pub fn verdict(&self) -> StageVerdict {
		match self {
			Self::Preflight(_) => StageVerdict::Preflight,
			Self::Deny(_) => StageVerdict::Deny,
		}
	}
}

/// Terminal outcome of a pipeline run.
#[derive(Debug)]
pub struct Stopped {
	/// Stage that stopped the request.
	pub stage: GateStage,
	/// What it decided.
	pub termination: Termination,
}

/// Stages evaluated in insertion order.
#[derive(Debug, Default)]
pub struct Pipeline {
	stages: Vec<Box<dyn Stage>>,
}
impl Pipeline {
	/// Composes stages into a single evaluator.
	pub fn compose<I>(stages: I) -> Self
	where
		I: IntoIterator<Item = Box<dyn Stage>>,
	{
		Self { stages: stages.into_iter().collect() }
	}

	/// Origin, security headers, API key, rate limit, then payload size.
	pub fn standard(policy: Arc<Policy>, limiter: Arc<RateLimiter>) -> Self {
		let max_payload_bytes = policy.max_payload_bytes;

		Self::compose([
			Box::new(OriginStage::new(policy.clone())) as Box<dyn Stage>,
			Box::new(SecurityHeadersStage),
			Box::new(ApiKeyStage::new(policy)),
			Box::new(RateLimitStage::new(limiter)),
			Box::new(PayloadSizeStage::new(max_payload_bytes)),
		])
	}

	/// Appends a stage after the existing ones.
	pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
		self.stages.push(stage);

		self
	}

	/// Stage kinds in evaluation order.
	pub fn kinds(&self) -> Vec<GateStage> {
		self.stages.iter().map(|stage| stage.kind()).collect()
	}

	/// Runs every stage until one terminates.
	pub fn run(&self, ctx: &mut GateContext) -> Result<(), Stopped> {
		self.stages.iter().try_for_each(|stage| {
			let kind = stage.kind();

			match stage.evaluate(ctx) {
				StageOutcome::Continue => {
					obs::record_stage_verdict(kind, StageVerdict::Continue);

					Ok(())
				},
				StageOutcome::Terminate(termination) => {
					obs::record_stage_verdict(kind, termination.verdict());

					Err(Stopped { stage: kind, termination })
				},
			}
		})
	}
}

/// Outcome of [`AccessGate::admit`].
#[derive(Debug)]
pub enum Admission {
	/// Every stage passed; the handler may run with this context.
	Admitted(GateContext),
	/// A stage stopped the request with a ready-to-send response.
	Stopped {
		/// Stage that stopped the request.
		stage: GateStage,
		/// Response to return to the caller.
		response: GateResponse,
	},
}

/// The pipeline plus the handler wrapper, counters, and clock used to stamp error bodies.
#[derive(Debug)]
pub struct AccessGate {
	pipeline: Pipeline,
	clock: Arc<dyn Clock>,
	metrics: Arc<GateMetrics>,
}
impl AccessGate {
	/// Creates a gate running the standard stage order.
	pub fn new(policy: Arc<Policy>, limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>) -> Self {
		Self::with_pipeline(Pipeline::standard(policy, limiter), clock)
	}

	/// Creates a gate running a custom pipeline.
	pub fn with_pipeline(pipeline: Pipeline, clock: Arc<dyn Clock>) -> Self {
		Self { pipeline, clock, metrics: Default::default() }
	}

	/// Outcome counters.
	pub fn metrics(&self) -> &Arc<GateMetrics> {
		&self.metrics
	}

	/// Stage pipeline.
	pub fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	/// Runs the pipeline without a handler.
	pub fn admit(&self, request: GateRequest) -> Admission {
		let mut ctx = GateContext::new(request);
		let Err(Stopped { stage, termination }) = self.pipeline.run(&mut ctx) else {
			self.metrics.record_admitted();

			return Admission::Admitted(ctx);
		};
		let response = match termination {
			Termination::Preflight(response) => {
				self.metrics.record_preflight();
				obs::log_stage_stop(stage, StageVerdict::Preflight, "preflight answered");

				response
			},
			Termination::Deny(error) => {
				self.metrics.record_denied(stage);
				self.log_error(stage, &error);

				GateResponse::from_error(&error, self.clock.now())
			},
		};

		Admission::Stopped { stage, response: response.merge_headers(&ctx.response_headers) }
	}

	/// Runs the pipeline and, when it admits the request, the handler.
	///
	/// Handler errors become error responses; internal detail is logged and never returned.
	/// Headers collected by the stages are added to whatever response is produced.
	pub async fn handle<H, Fut>(&self, request: GateRequest, handler: H) -> GateResponse
	where
		H: FnOnce(GateContext) -> Fut,
		Fut: Future<Output = Result<GateResponse>>,
	{
		let span = GateSpan::new(request.route.as_str());
		let recorder = span.clone();

		span.instrument(async move {
			let ctx = match self.admit(request) {
				Admission::Admitted(ctx) => ctx,
				Admission::Stopped { stage, response } => {
					recorder.record_stage(stage);

					return response;
				},
			};

			recorder.record_stage(GateStage::Handler);

			let headers = ctx.response_headers.clone();
			let response = match handler(ctx).await {
				Ok(response) => response,
				Err(error) => {
					self.metrics.record_handler_error();
					self.log_error(GateStage::Handler, &error);

					GateResponse::from_error(&error, self.clock.now())
				},
			};

			response.merge_headers(&headers)
		})
		.await
	}

	fn log_error(&self, stage: GateStage, error: &Error) {
		if error.is_internal() {
			obs::log_internal_error(error);
		} else {
			obs::log_stage_stop(stage, StageVerdict::Deny, error.kind());
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use http::{HeaderValue, Method, StatusCode, header::X_FRAME_OPTIONS};
	// self
	use super::*;
	use crate::{clock::ManualClock, rate_limit::LimiterScope};

	#[derive(Debug)]
	struct CountingStage {
		kind: GateStage,
		outcome: fn() -> StageOutcome,
		calls: Arc<AtomicUsize>,
	}
	impl Stage for CountingStage {
		fn kind(&self) -> GateStage {
			self.kind
		}

		fn evaluate(&self, _: &mut GateContext) -> StageOutcome {
			self.calls.fetch_add(1, Ordering::SeqCst);

			(self.outcome)()
		}
	}

	fn counting_stage(
		kind: GateStage,
		outcome: fn() -> StageOutcome,
	) -> (Box<dyn Stage>, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));

		(Box::new(CountingStage { kind, outcome, calls: calls.clone() }), calls)
	}

	fn request() -> GateRequest {
		GateRequest::new(Method::POST, RouteClass::ToolInvocation)
	}

	#[test]
	fn first_terminal_stage_short_circuits_the_rest() {
		let (origin, origin_calls) = counting_stage(GateStage::Origin, || StageOutcome::Continue);
		let (auth, auth_calls) = counting_stage(GateStage::ApiKey, || {
			StageOutcome::deny(crate::error::AuthError::MissingKey.into())
		});
		let (limit, limit_calls) = counting_stage(GateStage::RateLimit, || StageOutcome::Continue);
		let pipeline = Pipeline::compose([origin, auth, limit]);
		let stopped = pipeline
			.run(&mut GateContext::new(request()))
			.expect_err("The API-key stage must stop the run.");

		assert_eq!(stopped.stage, GateStage::ApiKey);
		assert_eq!(stopped.termination.verdict(), StageVerdict::Deny);
		assert_eq!(origin_calls.load(Ordering::SeqCst), 1);
		assert_eq!(auth_calls.load(Ordering::SeqCst), 1);
		assert_eq!(limit_calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn standard_order_is_fixed() {
		let policy = Arc::new(Policy::default());
		let limiter = Arc::new(RateLimiter::new(&policy, Arc::new(ManualClock::default())));

		assert_eq!(Pipeline::standard(policy, limiter).kinds(), [
			GateStage::Origin,
			GateStage::SecurityHeaders,
			GateStage::ApiKey,
			GateStage::RateLimit,
			GateStage::PayloadSize,
		]);
	}

	#[test]
	fn empty_pipeline_admits() {
		let gate = AccessGate::with_pipeline(Pipeline::default(), Arc::new(ManualClock::default()));

		assert!(matches!(gate.admit(request()), Admission::Admitted(_)));
		assert_eq!(gate.metrics().admitted(), 1);
	}

	#[tokio::test]
	async fn handler_runs_only_after_every_stage_passes() {
		let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
		let policy = Arc::new(Policy::default().with_secret_key("k"));
		let limiter = Arc::new(RateLimiter::new(&policy, clock.clone()));
		let gate = AccessGate::new(policy, limiter.clone(), clock);
		let ran = Arc::new(AtomicUsize::new(0));
		let counter = ran.clone();
		let response = gate
			.handle(request().with_tenant("u1"), |_| async move {
				counter.fetch_add(1, Ordering::SeqCst);

				GateResponse::json(StatusCode::OK, &serde_json::json!({ "ok": true }))
			})
			.await;

		assert_eq!(response.status, StatusCode::UNAUTHORIZED);
		assert_eq!(ran.load(Ordering::SeqCst), 0);
		assert!(limiter.counter(LimiterScope::Tenant, "u1").is_none());

		let ok = request().with_tenant("u1").with_header(X_API_KEY, HeaderValue::from_static("k"));
		let counter = ran.clone();
		let response = gate
			.handle(ok, |_| async move {
				counter.fetch_add(1, Ordering::SeqCst);

				GateResponse::json(StatusCode::OK, &serde_json::json!({ "ok": true }))
			})
			.await;

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(ran.load(Ordering::SeqCst), 1);
		assert_eq!(response.headers[X_FRAME_OPTIONS], "DENY");
		assert_eq!(response.headers[X_RATELIMIT_REMAINING], "99");
	}

	#[tokio::test]
	async fn internal_handler_errors_are_opaque() {
		let gate = AccessGate::with_pipeline(Pipeline::default(), Arc::new(ManualClock::default()));
		let response = gate
			.handle(request(), |_| async { Err(Error::internal("vault unreachable at 10.0.0.3")) })
			.await;
		let body = response.body.expect("Error responses carry a body.");

		assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["error"], "internal_error");
		assert!(!body["message"].as_str().unwrap_or_default().contains("10.0.0.3"));
		assert_eq!(gate.metrics().snapshot().handler_errors, 1);
	}
}
