//! Sticky assignment of reverb objects to render channels.

use orbis_objects::ObjectId;

use crate::error::{Result, ReverbError};

/// Fixed-capacity table mapping render channels to object ids.
///
/// An object keeps its channel for as long as it is passed to
/// [`set_objects`](Self::set_objects). Objects that disappear free their
/// channel before new objects are placed, and new objects take the lowest
/// free channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectChannelAllocator {
    channels: Vec<Option<ObjectId>>,
}

impl ObjectChannelAllocator {
    /// Creates an allocator with `channels` empty render channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: vec![None; channels],
        }
    }

    /// Number of render channels.
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Replaces the set of active objects.
    ///
    /// Fails without touching the table if there are more objects than
    /// channels. Duplicate ids are placed once.
    pub fn set_objects(&mut self, objects: &[ObjectId]) -> Result<()> {
        let mut unique = objects.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() > self.channels.len() {
            return Err(ReverbError::TooManyObjects {
                found: unique.len(),
                max: self.channels.len(),
            });
        }

        for slot in &mut self.channels {
            if slot.is_some_and(|id| unique.binary_search(&id).is_err()) {
                *slot = None;
            }
        }
        for &id in objects {
            if self.channel_for_object(id).is_some() {
                continue;
            }
            // Capacity was checked above, so a free slot exists.
            if let Some(slot) = self.channels.iter_mut().find(|s| s.is_none()) {
                *slot = Some(id);
            }
        }
        Ok(())
    }

    /// Object occupying a channel, `None` for an empty or invalid channel.
    pub fn object_for_channel(&self, channel: usize) -> Option<ObjectId> {
        self.channels.get(channel).copied().flatten()
    }

    /// Channel assigned to an object.
    pub fn channel_for_object(&self, id: ObjectId) -> Option<usize> {
        self.channels.iter().position(|&s| s == Some(id))
    }

    /// Number of occupied channels.
    pub fn occupied(&self) -> usize {
        self.channels.iter().filter(|s| s.is_some()).count()
    }
}
