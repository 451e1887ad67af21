//! Concurrent execution of independent upstream operations.
//!
//! Every task is spawned on the Tokio runtime as soon as the batch starts, so no
//! task waits for another to begin. Outcomes are reported in input order even
//! though completion order is arbitrary.

use core::fmt;
use core::future::Future;
use std::ops::Deref;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tollgate_types::{FanOutOptions, TollgateError};

/// One unit of work in a fan-out batch.
///
/// `context` is opaque to the aggregator. It is echoed back in the outcome and
/// attached to failure logs.
pub struct Task<C, F> {
    /// Caller-supplied diagnostics (e.g. exchange and pair).
    pub context: C,
    /// The operation to run.
    pub operation: F,
}

impl<C, F> Task<C, F> {
    /// Pair an operation with its context.
    pub const fn new(context: C, operation: F) -> Self {
        Self { context, operation }
    }
}

/// Settlement of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome<C, R> {
    /// The context supplied with the task.
    pub context: C,
    /// The task's value or its classified failure.
    pub result: Result<R, TollgateError>,
}

impl<C, R> TaskOutcome<C, R> {
    /// True if the task succeeded.
    pub const fn success(&self) -> bool {
        self.result.is_ok()
    }

    /// The value, if the task succeeded.
    pub fn value(&self) -> Option<&R> {
        self.result.as_ref().ok()
    }

    /// The failure, if the task failed.
    pub fn error(&self) -> Option<&TollgateError> {
        self.result.as_ref().err()
    }
}

/// Outcomes of a fan-out batch, indexed like the input tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcomes<C, R> {
    items: Vec<TaskOutcome<C, R>>,
}

impl<C, R> Outcomes<C, R> {
    /// Successful tasks with their contexts, in input order.
    pub fn successes(&self) -> impl Iterator<Item = (&C, &R)> {
        self.items
            .iter()
            .filter_map(|o| o.value().map(|v| (&o.context, v)))
    }

    /// Failed tasks with their contexts, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&C, &TollgateError)> {
        self.items
            .iter()
            .filter_map(|o| o.error().map(|e| (&o.context, e)))
    }

    /// Split into successes and failures, each keeping input order.
    #[must_use]
    pub fn partition(self) -> (Vec<(C, R)>, Vec<(C, TollgateError)>) {
        let mut ok = Vec::new();
        let mut failed = Vec::new();
        for o in self.items {
            match o.result {
                Ok(v) => ok.push((o.context, v)),
                Err(e) => failed.push((o.context, e)),
            }
        }
        (ok, failed)
    }

    /// The outcomes as a plain vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<TaskOutcome<C, R>> {
        self.items
    }
}

impl<C, R> Deref for Outcomes<C, R> {
    type Target = [TaskOutcome<C, R>];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<C, R> IntoIterator for Outcomes<C, R> {
    type Item = TaskOutcome<C, R>;
    type IntoIter = std::vec::IntoIter<TaskOutcome<C, R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

type Settled<R> = (usize, Result<R, TollgateError>);

/// Tasks in flight plus the slots their results land in.
struct Batch<C, R> {
    contexts: Vec<C>,
    slots: Vec<Option<Result<R, TollgateError>>>,
    pending: FuturesUnordered<BoxFuture<'static, Settled<R>>>,
}

impl<C, R> Batch<C, R>
where
    R: Send + 'static,
{
    fn spawn<I, F>(tasks: I) -> Self
    where
        I: IntoIterator<Item = Task<C, F>>,
        F: Future<Output = Result<R, TollgateError>> + Send + 'static,
    {
        let mut contexts = Vec::new();
        let pending = FuturesUnordered::new();
        for (index, task) in tasks.into_iter().enumerate() {
            contexts.push(task.context);
            // Dropping a JoinHandle detaches the task, so an early return leaves
            // the remaining tasks running in the background.
            let handle = tokio::spawn(task.operation);
            pending.push(
                handle
                    .map(move |joined| {
                        let result = joined.unwrap_or_else(|e| Err(join_failure(&e)));
                        (index, result)
                    })
                    .boxed(),
            );
        }
        let slots = contexts.iter().map(|_| None).collect();
        Self {
            contexts,
            slots,
            pending,
        }
    }

    fn finish(self) -> Outcomes<C, R> {
        let items = self
            .contexts
            .into_iter()
            .zip(self.slots)
            .map(|(context, slot)| TaskOutcome {
                context,
                result: slot.unwrap_or_else(|| {
                    Err(TollgateError::internal("fan-out task did not settle"))
                }),
            })
            .collect();
        Outcomes { items }
    }
}

fn join_failure(err: &JoinError) -> TollgateError {
    if err.is_panic() {
        TollgateError::internal("fan-out task panicked")
    } else {
        TollgateError::internal("fan-out task was cancelled")
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn log_failure<C: fmt::Debug>(index: usize, context: &C, err: &TollgateError) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        index,
        context = ?context,
        kind = %err.kind(),
        error = %err,
        "fan-out task failed"
    );
}

/// Run every task concurrently and report one outcome per task, in input order.
///
/// With `stop_on_error = false` this never fails: failures are reported as
/// outcomes and do not affect sibling tasks. With `stop_on_error = true` the first
/// failure to settle is returned unchanged; the remaining tasks keep running in
/// the background and their results are discarded.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
/// Only with `stop_on_error`: the first task failure, exactly as the task
/// produced it.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        name = "tollgate::fanout::all",
        skip_all,
        fields(
            log_failures = options.log_failures,
            stop_on_error = options.stop_on_error,
        ),
    )
)]
pub async fn all<C, F, R, I>(
    tasks: I,
    options: FanOutOptions,
) -> Result<Outcomes<C, R>, TollgateError>
where
    I: IntoIterator<Item = Task<C, F>>,
    F: Future<Output = Result<R, TollgateError>> + Send + 'static,
    R: Send + 'static,
    C: fmt::Debug,
{
    let mut batch = Batch::spawn(tasks);
    while let Some((index, result)) = batch.pending.next().await {
        match result {
            Err(err) if options.stop_on_error => {
                if options.log_failures {
                    log_failure(index, &batch.contexts[index], &err);
                }
                return Err(err);
            }
            Err(err) => {
                if options.log_failures {
                    log_failure(index, &batch.contexts[index], &err);
                }
                batch.slots[index] = Some(Err(err));
            }
            ok => batch.slots[index] = Some(ok),
        }
    }
    Ok(batch.finish())
}

/// [`all`] with default options: failures are logged and never abort the batch.
///
/// Must be called from within a Tokio runtime.
pub async fn all_settled<C, F, R, I>(tasks: I) -> Outcomes<C, R>
where
    I: IntoIterator<Item = Task<C, F>>,
    F: Future<Output = Result<R, TollgateError>> + Send + 'static,
    R: Send + 'static,
    C: fmt::Debug,
{
    let mut batch = Batch::spawn(tasks);
    while let Some((index, result)) = batch.pending.next().await {
        if let Err(err) = &result {
            log_failure(index, &batch.contexts[index], err);
        }
        batch.slots[index] = Some(result);
    }
    batch.finish()
}
