// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-writer membership service.
//!
//! One task owns the [`MembershipTable`] and applies commands in arrival
//! order. Everything else talks to it through a cloneable
//! [`MembershipHandle`]; each request carries a oneshot for its reply, so
//! callers see the result of their own transition and no state is shared.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::filter::{FilterError, SourceFilter};
use super::table::MembershipTable;
use super::{MembershipQuery, MembershipReport};
use crate::family::MulticastAddress;
use crate::logging::{Facility, Logger};
use crate::{log_debug, log_info};

/// Default depth of the command queue
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Membership service has stopped")]
    Closed,

    #[error(transparent)]
    Filter(#[from] FilterError),
}

type Reply<T> = oneshot::Sender<T>;

enum Command<A> {
    Join(A, Reply<Result<(), FilterError>>),
    Leave(A, Reply<Result<(), FilterError>>),
    JoinSource(A, A, Reply<Result<(), FilterError>>),
    LeaveSource(A, A, Reply<Result<(), FilterError>>),
    Include(A, A, Reply<()>),
    Exclude(A, A, Reply<()>),
    Apply(SourceFilter<A>, Reply<()>),
    Filter(A, Reply<Option<SourceFilter<A>>>),
    Accepts(A, A, Reply<bool>),
    CurrentState(Reply<MembershipReport<A>>),
    RespondTo(MembershipQuery<A>, Reply<Option<MembershipReport<A>>>),
}

/// Owns the membership table; run it with [`MembershipService::run`]
pub struct MembershipService<A> {
    table: MembershipTable<A>,
    command_rx: mpsc::Receiver<Command<A>>,
    logger: Logger,
}

/// Cloneable client of a running [`MembershipService`]
#[derive(Debug)]
pub struct MembershipHandle<A> {
    command_tx: mpsc::Sender<Command<A>>,
}

impl<A> Clone for MembershipHandle<A> {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
        }
    }
}

impl<A: MulticastAddress> MembershipService<A> {
    pub fn new(logger: Logger, capacity: usize) -> (Self, MembershipHandle<A>) {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
        let service = Self {
            table: MembershipTable::new(logger.clone()),
            command_rx,
            logger,
        };
        (service, MembershipHandle { command_tx })
    }

    /// Start the service on the current tokio runtime
    ///
    /// The task ends when every handle has been dropped and yields the
    /// final table.
    pub fn spawn(logger: Logger) -> (MembershipHandle<A>, JoinHandle<MembershipTable<A>>) {
        let (service, handle) = Self::new(logger, DEFAULT_COMMAND_CAPACITY);
        (handle, tokio::spawn(service.run()))
    }

    pub async fn run(mut self) -> MembershipTable<A> {
        log_info!(self.logger, Facility::Membership, "Membership service started");

        while let Some(command) = self.command_rx.recv().await {
            self.handle(command);
        }

        log_info!(
            self.logger,
            Facility::Membership,
            "Membership service stopped with {} groups",
            self.table.len()
        );
        self.table
    }

    fn handle(&mut self, command: Command<A>) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::Join(group, reply) => {
                let _ = reply.send(self.table.join(group));
            }
            Command::Leave(group, reply) => {
                let _ = reply.send(self.table.leave(group));
            }
            Command::JoinSource(group, source, reply) => {
                let _ = reply.send(self.table.join_source(group, source));
            }
            Command::LeaveSource(group, source, reply) => {
                let _ = reply.send(self.table.leave_source(group, source));
            }
            Command::Include(group, source, reply) => {
                self.table.include(group, source);
                let _ = reply.send(());
            }
            Command::Exclude(group, source, reply) => {
                self.table.exclude(group, source);
                let _ = reply.send(());
            }
            Command::Apply(filter, reply) => {
                self.table.apply(&filter);
                let _ = reply.send(());
            }
            Command::Filter(group, reply) => {
                let _ = reply.send(self.table.filter(&group).cloned());
            }
            Command::Accepts(group, source, reply) => {
                let _ = reply.send(self.table.accepts(&group, &source));
            }
            Command::CurrentState(reply) => {
                let _ = reply.send(self.table.current_state_report());
            }
            Command::RespondTo(query, reply) => {
                let response = self.table.respond_to(&query);
                log_debug!(
                    self.logger,
                    Facility::Membership,
                    "{:?} query for {} answered with {} records",
                    query.kind(),
                    query.group(),
                    response.as_ref().map_or(0, |r| r.len())
                );
                let _ = reply.send(response);
            }
        }
    }
}

impl<A: MulticastAddress> MembershipHandle<A> {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command<A>,
    ) -> Result<T, ServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ServiceError::Closed)?;
        reply_rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn join(&self, group: A) -> Result<(), ServiceError> {
        Ok(self.request(|r| Command::Join(group, r)).await??)
    }

    pub async fn leave(&self, group: A) -> Result<(), ServiceError> {
        Ok(self.request(|r| Command::Leave(group, r)).await??)
    }

    pub async fn join_source(&self, group: A, source: A) -> Result<(), ServiceError> {
        Ok(self
            .request(|r| Command::JoinSource(group, source, r))
            .await??)
    }

    pub async fn leave_source(&self, group: A, source: A) -> Result<(), ServiceError> {
        Ok(self
            .request(|r| Command::LeaveSource(group, source, r))
            .await??)
    }

    pub async fn include(&self, group: A, source: A) -> Result<(), ServiceError> {
        self.request(|r| Command::Include(group, source, r)).await
    }

    pub async fn exclude(&self, group: A, source: A) -> Result<(), ServiceError> {
        self.request(|r| Command::Exclude(group, source, r)).await
    }

    pub async fn apply(&self, filter: SourceFilter<A>) -> Result<(), ServiceError> {
        self.request(|r| Command::Apply(filter, r)).await
    }

    /// Snapshot of one group's filter
    pub async fn filter(&self, group: A) -> Result<Option<SourceFilter<A>>, ServiceError> {
        self.request(|r| Command::Filter(group, r)).await
    }

    pub async fn accepts(&self, group: A, source: A) -> Result<bool, ServiceError> {
        self.request(|r| Command::Accepts(group, source, r)).await
    }

    pub async fn current_state(&self) -> Result<MembershipReport<A>, ServiceError> {
        self.request(Command::CurrentState).await
    }

    pub async fn respond_to(
        &self,
        query: MembershipQuery<A>,
    ) -> Result<Option<MembershipReport<A>>, ServiceError> {
        self.request(|r| Command::RespondTo(query, r)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::FilterMode;
    use std::net::Ipv4Addr;

    fn group() -> Ipv4Addr {
        Ipv4Addr::new(232, 1, 1, 1)
    }

    #[tokio::test]
    async fn test_join_through_handle() {
        let (handle, task) = MembershipService::spawn(Logger::discard());
        handle.join(group()).await.unwrap();

        let filter = handle.filter(group()).await.unwrap().unwrap();
        assert_eq!(filter.mode(), FilterMode::Exclude);

        drop(handle);
        let table = task.await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_illegal_transition_is_reported() {
        let (handle, _task) = MembershipService::spawn(Logger::discard());
        handle.join(group()).await.unwrap();
        let err = handle.join(group()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Filter(FilterError::AlreadyJoined { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_service() {
        let (service, handle) = MembershipService::<Ipv4Addr>::new(Logger::discard(), 4);
        drop(service);
        assert_eq!(handle.join(group()).await, Err(ServiceError::Closed));
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let (handle, task) = MembershipService::spawn(Logger::discard());
        let mut joins = Vec::new();
        for i in 1..=20u8 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                handle
                    .join_source(group(), Ipv4Addr::new(10, 0, 0, i))
                    .await
            }));
        }
        for join in joins {
            join.await.unwrap().unwrap();
        }

        let report = handle.current_state().await.unwrap();
        assert_eq!(report.records()[0].sources.len(), 20);
        assert!(handle
            .accepts(group(), Ipv4Addr::new(10, 0, 0, 7))
            .await
            .unwrap());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_respond_to_query() {
        let (handle, _task) = MembershipService::spawn(Logger::discard());
        handle
            .include(group(), Ipv4Addr::new(10, 0, 0, 1))
            .await
            .unwrap();

        let query = MembershipQuery::general(Ipv4Addr::UNSPECIFIED, 100);
        let report = handle.respond_to(query).await.unwrap().unwrap();
        assert_eq!(report.len(), 1);
    }
}
