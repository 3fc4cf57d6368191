//! Relay error types.
//!
//! The relay itself never fails. The only errors are those returned by
//! business-logic listeners, collected per emission pass and surfaced to
//! whoever triggered the emission.

use thiserror::Error;

use crate::domain::foundation::{ConnectionId, DomainError, ErrorCode};

/// A single listener's failure during an emission pass.
#[derive(Debug, Clone, Error)]
#[error("{listener}: {source}")]
pub struct ListenerError {
    pub listener: String,
    #[source]
    pub source: DomainError,
}

/// Errors surfaced from event dispatch.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// One or more listeners failed while handling `event`.
    ///
    /// Every listener registered for the event still ran.
    #[error("{} listener(s) failed handling '{event}'", .failures.len())]
    Dispatch {
        event: String,
        failures: Vec<ListenerError>,
    },
}

impl RelayError {
    /// Event name the failures belong to.
    pub fn event(&self) -> &str {
        match self {
            RelayError::Dispatch { event, .. } => event,
        }
    }

    /// Individual listener failures, in invocation order.
    pub fn failures(&self) -> &[ListenerError] {
        match self {
            RelayError::Dispatch { failures, .. } => failures,
        }
    }

    /// Folds several dispatch results into one, concatenating failures.
    ///
    /// The first failing event's name labels the merged error.
    pub fn merge(results: impl IntoIterator<Item = Result<(), RelayError>>) -> Result<(), RelayError> {
        let mut merged: Option<(String, Vec<ListenerError>)> = None;
        for result in results {
            if let Err(RelayError::Dispatch { event, failures }) = result {
                match merged.as_mut() {
                    Some((_, all)) => all.extend(failures),
                    None => merged = Some((event, failures)),
                }
            }
        }
        match merged {
            Some((event, failures)) => Err(RelayError::Dispatch { event, failures }),
            None => Ok(()),
        }
    }
}

impl From<RelayError> for DomainError {
    fn from(err: RelayError) -> Self {
        let mut domain = DomainError::new(ErrorCode::ListenerFailed, err.to_string())
            .with_detail("event", err.event());
        for (index, failure) in err.failures().iter().enumerate() {
            domain = domain.with_detail(format!("listener.{}", index), failure.to_string());
        }
        domain
    }
}

/// A poll whose client events could not all be handled.
///
/// The connection is still alive and its timer was reset; outbound events
/// stay queued for the next poll.
#[derive(Debug, Clone, Error)]
#[error("{} dispatch failure(s) on connection {connection_id}", .failures.len())]
pub struct PollError {
    pub connection_id: ConnectionId,
    pub failures: Vec<RelayError>,
}
