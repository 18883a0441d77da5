//! Command handling infrastructure.

use std::marker::PhantomData;

use async_trait::async_trait;
use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent, reconstruct};
use crate::error::DomainError;

/// Default number of load-decide-append cycles before a conflict is returned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The committed envelopes, ready to be published.
    pub envelopes: Vec<EventEnvelope>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// An intention to change one aggregate.
///
/// `handle` inspects the current state, consults whatever read-only
/// collaborators live in `Context`, and either returns the events to record
/// or rejects the command.
#[async_trait]
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    /// Read-only collaborators the command needs to decide.
    type Context: Send + Sync;

    fn aggregate_id(&self) -> AggregateId;

    /// Short name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        aggregate: &Self::Aggregate,
        ctx: &Self::Context,
    ) -> Result<Vec<<Self::Aggregate as Aggregate>::Event>, <Self::Aggregate as Aggregate>::Error>;
}

/// Loads aggregates from the event log and runs commands against them.
///
/// Every append is conditioned on the version that was loaded. When another
/// writer got there first the whole cycle is repeated on fresh state, up to
/// `max_attempts` times.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    max_attempts: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            _phantom: PhantomData,
        }
    }

    /// Sets how many times a conflicting command is attempted. Zero is
    /// treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let history = self.store.get_events_for_aggregate(aggregate_id).await?;
        Ok(reconstruct(&history)?)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Runs a command and persists the events it produces.
    pub async fn dispatch<C>(&self, cmd: &C, ctx: &C::Context) -> Result<CommandResult<A>, DomainError>
    where
        C: Command<Aggregate = A>,
        DomainError: From<A::Error>,
    {
        let aggregate_id = cmd.aggregate_id();
        let mut attempt = 1;

        loop {
            let mut aggregate = self.load(aggregate_id).await?;
            let base = aggregate.version();

            let events = cmd.handle(&aggregate, ctx).await?;
            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    envelopes: vec![],
                    new_version: base,
                });
            }

            let envelopes = build_envelopes::<A>(aggregate_id, base, &events)?;

            match self
                .store
                .append(envelopes.clone(), AppendOptions::expect_version(base))
                .await
            {
                Ok(new_version) => {
                    aggregate.apply_events(events.iter().cloned());
                    aggregate.set_version(new_version);

                    return Ok(CommandResult {
                        aggregate,
                        events,
                        envelopes,
                        new_version,
                    });
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    metrics::counter!("crop_command_conflicts_total").increment(1);
                    tracing::warn!(
                        command = cmd.name(),
                        %aggregate_id,
                        attempt,
                        "version conflict, retrying command"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Wraps domain events into envelopes numbered right after `base`.
fn build_envelopes<A: Aggregate>(
    aggregate_id: AggregateId,
    base: Version,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut envelopes = Vec::with_capacity(events.len());
    let mut version = base;

    for event in events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(A::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .data(event.encode()?)
            .schema_version(<A::Event as DomainEvent>::schema_version())
            .build()?;
        envelopes.push(envelope);
    }

    Ok(envelopes)
}
