//! The request/response boundary between the AI and the server.
//!
//! Missions never mutate the world directly. They hand a [`ServerRequest`]
//! to a [`Connection`], which applies it (or refuses it) and answers with a
//! typed [`ServerResponse`]. Tests swap the real server for a scripted or
//! recording connection.

use std::collections::VecDeque;

use thiserror::Error;

use crate::protocol::{ServerRequest, ServerResponse};
use crate::world::World;

/// Why a request did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The server refused the request; nothing changed.
    #[error("{request} rejected: {reason}")]
    Rejected {
        /// Message name of the refused request.
        request: &'static str,
        /// Server explanation.
        reason: String,
    },

    /// The connection is gone.
    #[error("connection closed")]
    Closed,
}

impl ConnectionError {
    /// Shorthand for a rejection of `request`.
    #[must_use]
    pub fn rejected(request: &ServerRequest, reason: impl Into<String>) -> Self {
        Self::Rejected {
            request: request.name(),
            reason: reason.into(),
        }
    }
}

/// A synchronous request/response channel to the server.
pub trait Connection {
    /// Send a request and wait for the reply. A successful reply means the
    /// effect has been applied to `world`.
    fn ask(
        &mut self,
        world: &mut World,
        request: &ServerRequest,
    ) -> Result<ServerResponse, ConnectionError>;
}

/// One entry of a [`RecordingConnection`] log.
pub type Exchange = (ServerRequest, Result<ServerResponse, ConnectionError>);

/// Decorator that records every exchange passing through it.
#[derive(Debug, Default)]
pub struct RecordingConnection<C> {
    inner: C,
    log: Vec<Exchange>,
}

impl<C: Connection> RecordingConnection<C> {
    /// Wrap a connection.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            log: Vec::new(),
        }
    }

    /// Every exchange so far, oldest first.
    #[must_use]
    pub fn log(&self) -> &[Exchange] {
        &self.log
    }

    /// Requests sent so far, oldest first.
    pub fn requests(&self) -> impl Iterator<Item = &ServerRequest> {
        self.log.iter().map(|(request, _)| request)
    }

    /// Number of refused requests.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.log.iter().filter(|(_, reply)| reply.is_err()).count()
    }

    /// Forget the log.
    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// The wrapped connection.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: Connection> Connection for RecordingConnection<C> {
    fn ask(
        &mut self,
        world: &mut World,
        request: &ServerRequest,
    ) -> Result<ServerResponse, ConnectionError> {
        let reply = self.inner.ask(world, request);
        self.log.push((request.clone(), reply.clone()));
        reply
    }
}

/// Connection that answers from a script and never touches the world.
#[derive(Debug, Clone)]
pub struct ScriptedConnection {
    replies: VecDeque<Result<ServerResponse, ConnectionError>>,
    fallback: Result<ServerResponse, ConnectionError>,
}

impl ScriptedConnection {
    /// Answer every request with `Ok`.
    #[must_use]
    pub fn accepting() -> Self {
        Self {
            replies: VecDeque::new(),
            fallback: Ok(ServerResponse::Ok),
        }
    }

    /// Refuse every request.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            replies: VecDeque::new(),
            fallback: Err(ConnectionError::Closed),
        }
    }

    /// Queue a reply used before falling back to the default.
    #[must_use]
    pub fn then(mut self, reply: Result<ServerResponse, ConnectionError>) -> Self {
        self.replies.push_back(reply);
        self
    }
}

impl Connection for ScriptedConnection {
    fn ask(
        &mut self,
        _world: &mut World,
        _request: &ServerRequest,
    ) -> Result<ServerResponse, ConnectionError> {
        self.replies
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UnitId;
    use crate::map::{GameMap, Terrain};

    #[test]
    fn test_recording_keeps_order_and_failures() {
        let mut world = World::new(GameMap::new(2, 2, Terrain::Plains));
        let script = ScriptedConnection::accepting()
            .then(Ok(ServerResponse::Demand { accepted: false }))
            .then(Err(ConnectionError::Closed));
        let mut connection = RecordingConnection::new(script);
        for id in 1..=3 {
            let _ = connection.ask(&mut world, &ServerRequest::Disembark { unit: UnitId(id) });
        }
        let units: Vec<_> = connection
            .requests()
            .map(|r| match r {
                ServerRequest::Disembark { unit } => unit.raw(),
                _ => 0,
            })
            .collect();
        assert_eq!(units, vec![1, 2, 3]);
        assert_eq!(connection.failures(), 1);
        assert_eq!(connection.log()[2].1, Ok(ServerResponse::Ok));
    }
}
