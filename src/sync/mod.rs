//! Assembles fragmented updates from the phone into the [`FrontableCache`].
//!
//! Each entity type (groups, frontables, current fronters) has its own transfer. A transfer
//! starts with a message declaring the total record count, continues with batches that are
//! staged in the cache, and completes once the received count reaches the total. Only then
//! is the live collection replaced, so a half-received update is never visible.
//!
//! Within one message, groups are handled before frontables and frontables before current
//! fronters: frontable group bits need the final group positions, and fronter hashes need
//! the final frontables.

use tracing::{debug, info, instrument, warn};

use crate::cache::FrontableCache;
use crate::error::{CacheError, Result};

pub use self::message::{
    decode_frontables, decode_groups, decode_hashes, InboundMessage, CURRENT_FRONTS_PER_MESSAGE,
    DELIMITER, FRONTABLES_PER_MESSAGE, GROUPS_PER_MESSAGE,
};

mod message;

/// Notification that a transfer completed and its live collection was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// groups were replaced, holding `count` groups
    GroupsLoaded {
        /// new group count
        count: usize,
    },
    /// members and custom fronts were replaced
    FrontablesLoaded {
        /// new frontable count
        count: usize,
    },
    /// the current fronters were replaced
    FrontersLoaded {
        /// new current fronter count
        count: usize,
    },
}

/// Progress of one entity type's transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// no transfer in progress
    Idle,
    /// a transfer of `total` records is in progress, `received` have been staged
    Receiving {
        /// declared record count
        total: usize,
        /// records staged so far
        received: usize,
    },
}

impl Default for TransferState {
    fn default() -> Self {
        TransferState::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entity {
    Groups,
    Frontables,
    Fronters,
}

impl Entity {
    fn name(self) -> &'static str {
        match self {
            Entity::Groups => "groups",
            Entity::Frontables => "frontables",
            Entity::Fronters => "current fronters",
        }
    }
}

/// Drives the cache's staging API from inbound messages.
#[derive(Debug, Default)]
pub struct SyncHandler {
    groups: TransferState,
    frontables: TransferState,
    fronters: TransferState,

    groups_loaded: bool,
    frontables_loaded: bool,
    // groups of the current or last group transfer that did not fit
    groups_dropped: usize,
    fronters_loaded: bool,
}

impl SyncHandler {
    /// a handler with every transfer idle
    pub fn new() -> Self {
        SyncHandler::default()
    }

    /// state of the group transfer
    pub fn groups_state(&self) -> TransferState {
        self.groups
    }

    /// state of the frontable transfer
    pub fn frontables_state(&self) -> TransferState {
        self.frontables
    }

    /// state of the current fronter transfer
    pub fn fronters_state(&self) -> TransferState {
        self.fronters
    }

    /// true once a group transfer has completed
    pub fn groups_loaded(&self) -> bool {
        self.groups_loaded
    }

    /// Number of groups the current or last group transfer dropped because the group
    /// collection holds at most `MAX_GROUPS`.
    pub fn groups_dropped(&self) -> usize {
        self.groups_dropped
    }

    /// true once a frontable transfer has completed
    pub fn frontables_loaded(&self) -> bool {
        self.frontables_loaded
    }

    /// true once a current fronter transfer has completed, even an empty one
    pub fn fronters_loaded(&self) -> bool {
        self.fronters_loaded
    }

    /// Applies one inbound message to `cache`, returning the transfers it completed.
    ///
    /// # Errors
    /// A malformed batch, a batch with no transfer in progress, or a frontable or fronter
    /// staging overflow fails with an error. Nothing from the failing fragment is staged and
    /// its transfer stays in progress. Groups past `MAX_GROUPS` are dropped instead, and the
    /// group transfer still completes.
    #[instrument(skip_all)]
    pub fn receive(&mut self, cache: &mut FrontableCache, msg: &InboundMessage) -> Result<Vec<SyncEvent>> {
        let mut events = Vec::new();

        // groups
        if let Some(total) = msg.num_total_groups {
            self.begin(cache, Entity::Groups, total as usize);
        }
        if let Some(n) = msg.num_groups_in_batch {
            let batch_start = self.received(Entity::Groups)?;
            let batch = decode_groups(msg, n as usize, batch_start)?;
            let dropped = cache.stage_groups(batch);
            if dropped > 0 {
                warn!(dropped, "group collection is full, dropping groups");
                self.groups_dropped += dropped;
            }
            self.advance(Entity::Groups, n as usize);
        }
        self.complete_if_done(cache, Entity::Groups, &mut events)?;

        // frontables
        if let Some(total) = msg.num_total_frontables {
            self.begin(cache, Entity::Frontables, total as usize);
        }
        if let Some(n) = msg.num_frontables_in_batch {
            self.received(Entity::Frontables)?;
            let batch = decode_frontables(msg, n as usize)?;
            cache.stage_frontables(batch)?;
            self.advance(Entity::Frontables, n as usize);
        }
        self.complete_if_done(cache, Entity::Frontables, &mut events)?;

        // current fronters
        if let Some(total) = msg.num_current_fronters {
            self.begin(cache, Entity::Fronters, total as usize);
        }
        if let Some(n) = msg.num_current_fronters_in_batch {
            self.received(Entity::Fronters)?;
            let column = msg.current_fronter.as_deref().ok_or_else(|| {
                CacheError::Protocol("batch is missing the CurrentFronter column".to_owned())
            })?;
            let hashes = decode_hashes(column, "CurrentFronter", n as usize)?;
            cache.stage_current_fronters(hashes)?;
            self.advance(Entity::Fronters, n as usize);
        }
        self.complete_if_done(cache, Entity::Fronters, &mut events)?;

        Ok(events)
    }

    fn state_mut(&mut self, entity: Entity) -> &mut TransferState {
        match entity {
            Entity::Groups => &mut self.groups,
            Entity::Frontables => &mut self.frontables,
            Entity::Fronters => &mut self.fronters,
        }
    }

    fn begin(&mut self, cache: &mut FrontableCache, entity: Entity, total: usize) {
        let state = self.state_mut(entity);
        if let TransferState::Receiving { total: old, received } = *state {
            warn!(entity = entity.name(), old, received, "restarting unfinished transfer");
        }
        *state = TransferState::Receiving { total, received: 0 };
        match entity {
            Entity::Groups => {
                self.groups_dropped = 0;
                cache.begin_groups();
            }
            Entity::Frontables => cache.begin_frontables(),
            Entity::Fronters => cache.begin_current_fronters(),
        }
        debug!(entity = entity.name(), total, "transfer started");
    }

    /// records received so far, or a protocol error if no transfer is in progress
    fn received(&mut self, entity: Entity) -> Result<usize> {
        match *self.state_mut(entity) {
            TransferState::Receiving { received, .. } => Ok(received),
            TransferState::Idle => Err(CacheError::Protocol(format!(
                "received a batch of {} with no transfer in progress",
                entity.name()
            ))),
        }
    }

    fn advance(&mut self, entity: Entity, n: usize) {
        if let TransferState::Receiving { received, total } = self.state_mut(entity) {
            *received += n;
            debug!(entity = entity.name(), received = *received, total = *total, "batch staged");
        }
    }

    fn complete_if_done(
        &mut self,
        cache: &mut FrontableCache,
        entity: Entity,
        events: &mut Vec<SyncEvent>,
    ) -> Result<()> {
        match *self.state_mut(entity) {
            TransferState::Receiving { total, received } if received >= total => {}
            _ => return Ok(()),
        }
        *self.state_mut(entity) = TransferState::Idle;

        let event = match entity {
            Entity::Groups => {
                self.groups_loaded = true;
                SyncEvent::GroupsLoaded {
                    count: cache.flush_groups()?,
                }
            }
            Entity::Frontables => {
                self.frontables_loaded = true;
                SyncEvent::FrontablesLoaded {
                    count: cache.flush_frontables()?,
                }
            }
            Entity::Fronters => {
                self.fronters_loaded = true;
                SyncEvent::FrontersLoaded {
                    count: cache.flush_current_fronters()?,
                }
            }
        };
        info!(?event, "transfer complete");
        events.push(event);
        Ok(())
    }
}
