use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// One unit of load: a single request against the system under test.
///
/// Each worker owns a clone of the action and calls it once per schedule slot. The pool does the
/// timing, so an action only reports whether the call succeeded. Any closure returning a future
/// implements it:
///
/// ```
/// use labench::RequestError;
///
/// let action = || async { Ok::<(), RequestError>(()) };
/// # fn takes<A: labench::RequestAction>(_: A) {}
/// takes(action);
/// ```
pub trait RequestAction: Send + Sync + 'static {
    fn call(&self) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl<T, F> RequestAction for T
where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = Result<(), RequestError>> + Send,
{
    fn call(&self) -> impl Future<Output = Result<(), RequestError>> + Send {
        self()
    }
}

/// Why a single request failed. Recorded as data; never aborts the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {actual}, expected {expected}")]
    UnexpectedStatus { expected: u16, actual: u16 },
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::Timeout(_) => ErrorKind::Timeout,
            RequestError::Transport(_) => ErrorKind::Transport,
            RequestError::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Transport,
    UnexpectedStatus,
}
