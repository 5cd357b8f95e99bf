//! Concurrent completion of several routed statements.

use ormkit_core::{Error, Outcome};
use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::Poll;

/// A boxed statement future borrowed from its caller.
pub type BoxOutcome<'a, T> = Pin<Box<dyn Future<Output = Outcome<T, Error>> + Send + 'a>>;

/// Drive every future to completion concurrently.
///
/// Resolves with all values in input order once every future succeeded, or
/// with the first failure as soon as it happens. Futures still pending at
/// that point are dropped; statements they already sent are not undone.
pub async fn join_all<'a, T: Send + 'a>(futures: Vec<BoxOutcome<'a, T>>) -> Outcome<Vec<T>, Error> {
    let mut pending: Vec<Option<BoxOutcome<'a, T>>> = futures.into_iter().map(Some).collect();
    let mut done: Vec<Option<T>> = pending.iter().map(|_| None).collect();

    poll_fn(move |task| {
        let mut waiting = false;
        for (slot, value) in pending.iter_mut().zip(done.iter_mut()) {
            let Some(future) = slot.as_mut() else {
                continue;
            };
            match future.as_mut().poll(task) {
                Poll::Pending => waiting = true,
                Poll::Ready(Outcome::Ok(v)) => {
                    *value = Some(v);
                    *slot = None;
                }
                Poll::Ready(Outcome::Err(e)) => return Poll::Ready(Outcome::Err(e)),
                Poll::Ready(Outcome::Cancelled(r)) => return Poll::Ready(Outcome::Cancelled(r)),
                Poll::Ready(Outcome::Panicked(p)) => return Poll::Ready(Outcome::Panicked(p)),
            }
        }
        if waiting {
            Poll::Pending
        } else {
            Poll::Ready(Outcome::Ok(done.iter_mut().filter_map(Option::take).collect()))
        }
    })
    .await
}
