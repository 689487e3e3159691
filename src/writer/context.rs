//! Shared state threaded through the writer pipeline.

use crate::error::{Error, Result};
use crate::writer::config::{RefId, RefsList};

/// Monotonic item/track id allocator, with an optional base offset.
#[derive(Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new(base: u32) -> IdAllocator {
        IdAllocator { next: base.max(1) }
    }

    pub fn alloc(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> IdAllocator {
        IdAllocator::new(1)
    }
}

/// How a content was encapsulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capsulation {
    Meta,
    Trak,
}

/// What one writer pass published for a `uniq_bsid`.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub capsulation: Capsulation,
    /// Item ids (meta) or `(track_id, sample_count)` (trak).
    pub item_ids:    Vec<u32>,
    pub track_id:    Option<u32>,
}

/// The cross-writer registry: `uniq_bsid` to produced ids.
///
/// A single-owner value passed through the pipeline; pass 1 populates
/// it, later writers (thumbnails, auxiliary, derived, primary item)
/// consume it.
#[derive(Debug, Default)]
pub struct WriteContext {
    pub ids:     IdAllocator,
    entries:     Vec<(u32, RegistryEntry)>,
}

impl WriteContext {
    pub fn new() -> WriteContext {
        WriteContext::default()
    }

    /// Publish the ids produced for a `uniq_bsid`.
    pub fn publish(&mut self, uniq_bsid: u32, entry: RegistryEntry) -> Result<()> {
        if self.entries.iter().any(|(id, _)| *id == uniq_bsid) {
            return Err(Error::WriterValidation(format!(
                "duplicate uniq_bsid {}",
                uniq_bsid
            )));
        }
        self.entries.push((uniq_bsid, entry));
        Ok(())
    }

    pub fn lookup(&self, uniq_bsid: u32) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|(id, _)| *id == uniq_bsid)
            .map(|(_, e)| e)
    }

    /// Resolve a `uniq_bsid` + 1-based index to a live item id.
    pub fn resolve(&self, reference: &RefId) -> Result<u32> {
        let entry = self.lookup(reference.uniq_bsid).ok_or_else(|| {
            Error::WriterValidation(format!("unknown uniq_bsid {}", reference.uniq_bsid))
        })?;
        if reference.index == 0 {
            return Err(Error::WriterValidation(
                "reference indexes are 1-based".to_string(),
            ));
        }
        entry
            .item_ids
            .get((reference.index - 1) as usize)
            .copied()
            .ok_or_else(|| {
                Error::WriterValidation(format!(
                    "uniq_bsid {} has no image index {}",
                    reference.uniq_bsid, reference.index
                ))
            })
    }

    /// Resolve a refs list to item ids; an empty index list means all.
    pub fn resolve_list(&self, refs: &RefsList) -> Result<Vec<u32>> {
        let entry = self.lookup(refs.uniq_bsid).ok_or_else(|| {
            Error::WriterValidation(format!("unknown uniq_bsid {}", refs.uniq_bsid))
        })?;
        if refs.idxs.is_empty() {
            return Ok(entry.item_ids.clone());
        }
        refs.idxs
            .iter()
            .map(|&idx| {
                self.resolve(&RefId {
                    uniq_bsid: refs.uniq_bsid,
                    index: idx,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_by_index() {
        let mut ctx = WriteContext::new();
        let a = ctx.ids.alloc();
        let b = ctx.ids.alloc();
        ctx.publish(
            7,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids: vec![a, b],
                track_id: None,
            },
        )
        .unwrap();

        assert_eq!(ctx.resolve(&RefId { uniq_bsid: 7, index: 1 }).unwrap(), a);
        assert_eq!(ctx.resolve(&RefId { uniq_bsid: 7, index: 2 }).unwrap(), b);
        assert!(ctx.resolve(&RefId { uniq_bsid: 7, index: 3 }).is_err());
        assert!(ctx.resolve(&RefId { uniq_bsid: 9, index: 1 }).is_err());
    }

    #[test]
    fn duplicate_uniq_bsid_is_refused() {
        let mut ctx = WriteContext::new();
        let entry = RegistryEntry {
            capsulation: Capsulation::Meta,
            item_ids: vec![1],
            track_id: None,
        };
        ctx.publish(1, entry.clone()).unwrap();
        assert!(ctx.publish(1, entry).is_err());
    }

    #[test]
    fn empty_idxs_resolves_all() {
        let mut ctx = WriteContext::new();
        ctx.publish(
            3,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids: vec![5, 6, 7],
                track_id: None,
            },
        )
        .unwrap();
        let all = ctx
            .resolve_list(&RefsList {
                uniq_bsid: 3,
                idxs: vec![],
            })
            .unwrap();
        assert_eq!(all, vec![5, 6, 7]);
    }
}
