//! Per-invocation lifecycle driver.
//!
//! ```text
//! START → RESOLVE_AUX → BEGIN → HANDLER → END → DONE
//!              │           │        │       │
//!              └──────── ERROR_RECOVERY ────┘
//! ```
//!
//! Every failure is routed through [`Invocation::recover`]: the request's
//! last error is set, every plugin's `error` hook runs once in declared
//! order, and the response fails if nothing completed it. End hooks run
//! after any begin or handler failure so plugins can flush.

use crate::chain::PluginChain;
use crate::guard::guarded;
use crate::middleware_set::MiddlewareSet;
use futures_util::future::join_all;
use hermes_core::{
    Context, ErrorCategory, Handler, HandlerRequest, HandlerResponse, HermesError, HermesResult,
    HookContext, HookKind, InvocationId, InvocationSlots, Phase, SharedError,
};
use hermes_telemetry::metrics::{self, InFlightGuard, Outcome};
use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// A failure caught during one phase.
#[derive(Debug, Clone)]
pub struct PhaseError {
    /// Where it happened.
    pub phase: Phase,
    /// The failing plugin, for hook and resolution failures.
    pub plugin: Option<&'static str>,
    /// The error itself.
    pub error: SharedError,
}

/// What happened during one invocation.
#[derive(Debug, Clone)]
pub struct InvocationReport {
    id: InvocationId,
    errors: Vec<PhaseError>,
}

impl InvocationReport {
    /// The invocation ID.
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Every caught failure, in the order it was recovered.
    pub fn errors(&self) -> &[PhaseError] {
        &self.errors
    }

    /// The first caught failure.
    pub fn first_error(&self) -> Option<SharedError> {
        self.errors.first().map(|e| Arc::clone(&e.error))
    }

    /// Whether every phase succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drives one invocation against a [`MiddlewareSet`].
pub struct Invocation<'a, L: PluginChain> {
    id: InvocationId,
    set: &'a MiddlewareSet<L>,
    request: Arc<HandlerRequest>,
    response: Arc<HandlerResponse>,
    slots: Arc<InvocationSlots>,
    errors: Vec<PhaseError>,
}

impl<'a, L: PluginChain> Invocation<'a, L> {
    /// Creates an invocation with a fresh ID and empty slots.
    pub fn new(
        set: &'a MiddlewareSet<L>,
        request: Arc<HandlerRequest>,
        response: Arc<HandlerResponse>,
    ) -> Self {
        Self {
            id: InvocationId::new(),
            set,
            request,
            response,
            slots: Arc::new(InvocationSlots::new()),
            errors: Vec::new(),
        }
    }

    /// The invocation ID.
    pub const fn id(&self) -> InvocationId {
        self.id
    }

    /// Runs the whole lifecycle. The response is completed exactly once by
    /// the time this returns.
    pub async fn run<H>(self, handler: &H) -> InvocationReport
    where
        H: Handler<L::Aux>,
    {
        let span = tracing::info_span!("invocation", invocation_id = %self.id);
        self.run_inner(handler).instrument(span).await
    }

    async fn run_inner<H>(mut self, handler: &H) -> InvocationReport
    where
        H: Handler<L::Aux>,
    {
        let _in_flight = InFlightGuard::new();
        let started = Instant::now();

        match self.set.resolve().await {
            Ok(aux) => self.run_phases(aux, handler).await,
            Err(error) => {
                tracing::error!(
                    phase = Phase::Resolve.name(),
                    error = %error,
                    "aux resolution failed, skipping all hooks"
                );
                metrics::record_phase_error(Phase::Resolve.name());
                self.request.record_error(Arc::clone(&error));
                // Initialization failures are server errors unless they carry
                // an explicit status.
                if error.category() == ErrorCategory::Http {
                    self.response.fail_with_error(&error);
                } else {
                    self.response
                        .fail_with_error_status(&error, StatusCode::INTERNAL_SERVER_ERROR);
                }
                self.errors.push(PhaseError {
                    phase: Phase::Resolve,
                    plugin: None,
                    error,
                });
            }
        }

        let outcome = if self.errors.is_empty() {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        let elapsed = started.elapsed();
        metrics::record_invocation(outcome, elapsed);
        tracing::debug!(
            outcome = outcome.as_str(),
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            status = self.response.completed_status().map(|s| s.as_u16()),
            "invocation finished"
        );

        InvocationReport {
            id: self.id,
            errors: self.errors,
        }
    }

    async fn run_phases<H>(&mut self, aux: Arc<L::Aux>, handler: &H)
    where
        H: Handler<L::Aux>,
    {
        let ctx = Context::new(
            self.id,
            Arc::clone(&self.request),
            Arc::clone(&self.response),
            aux,
            Arc::clone(&self.slots),
        );
        let hook_ctx = ctx.erase();

        let begin_ok = self.run_hooks(HookKind::Begin, &hook_ctx).await;

        if begin_ok {
            tracing::debug!(phase = Phase::Handler.name(), "running handler");
            match guarded(Phase::Handler, handler.handle(ctx)).await {
                Ok(output) => {
                    if let Err(error) = self.complete_with(&output) {
                        self.recover(Phase::Handler, None, error, &hook_ctx).await;
                    }
                }
                Err(error) => self.recover(Phase::Handler, None, error, &hook_ctx).await,
            }
        } else {
            tracing::debug!("begin phase failed, skipping handler");
        }

        self.run_hooks(HookKind::End, &hook_ctx).await;
    }

    /// Runs one hook of every plugin concurrently, then recovers each
    /// failure in declared order. Returns `true` when none failed.
    async fn run_hooks(&mut self, kind: HookKind, ctx: &HookContext) -> bool {
        let phase = kind.phase();
        let set = self.set;
        let hooks = set.hooks();
        tracing::debug!(phase = phase.name(), hooks = hooks.len(), "running hooks");

        let results = join_all(
            hooks
                .iter()
                .map(|hook| guarded(phase, hook.run_hook(kind, ctx))),
        )
        .await;

        let mut all_ok = true;
        for (hook, result) in hooks.iter().zip(results) {
            if let Err(error) = result {
                all_ok = false;
                self.recover(phase, Some(hook.plugin_name()), error, ctx).await;
            }
        }
        all_ok
    }

    /// Sends the handler's value unless the handler already completed the
    /// response. Unit and `null` become `{}`.
    fn complete_with<T: serde::Serialize>(&self, output: &T) -> HermesResult<()> {
        if self.response.is_completed() {
            return Ok(());
        }
        let body = match serde_json::to_value(output)? {
            Value::Null => Value::Object(serde_json::Map::new()),
            body => body,
        };
        self.response.ok(&body)?;
        Ok(())
    }

    async fn recover(
        &mut self,
        phase: Phase,
        plugin: Option<&'static str>,
        error: HermesError,
        ctx: &HookContext,
    ) {
        let error: SharedError = Arc::new(error);
        tracing::error!(
            phase = phase.name(),
            plugin = plugin.unwrap_or("-"),
            error = %error,
            "phase failed"
        );
        metrics::record_phase_error(phase.name());
        self.request.record_error(Arc::clone(&error));

        let set = self.set;
        for hook in set.hooks() {
            let outcome = guarded(Phase::Error, hook.run_hook(HookKind::Error, ctx)).await;
            if let Err(hook_error) = outcome {
                tracing::error!(
                    plugin = hook.plugin_name(),
                    error = %hook_error,
                    "error hook failed"
                );
                metrics::record_error_hook_failure(hook.plugin_name());
            }
        }

        if !self.response.is_completed() {
            self.response.fail_with_error(&error);
        }

        self.errors.push(PhaseError {
            phase,
            plugin,
            error,
        });
    }
}
