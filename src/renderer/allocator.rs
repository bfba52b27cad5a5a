//! Virtual target allocation.
//!
//! Every logical target referenced by the pass chain gets a [`VirtualTarget`]
//! with a READ slot (what later passes sample) and a WRITE slot (what the
//! current pass renders into). Writers are bound to physical buffers lazily;
//! when a target's own buffer is still needed by a reader, a free auxiliary
//! buffer of exactly the same shape is borrowed from the pool, or a new one
//! is cloned. After each pass the written slots become the read slots.
//!
//! Which buffers are claimed is state owned by a single [`BakeSession`] and
//! dropped with it. A buffer is claimed exactly while some slot holds it.

use rustc_hash::{FxHashMap, FxHashSet};

use super::error::BakeError;
use super::registry::{TargetId, TargetIndex, TargetRegistry};
use crate::gpu::RenderBackend;

/// Contents of one virtual slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Nothing bound.
    Unassigned,
    /// Will hold whatever the named target holds when first read.
    Seeded(TargetId),
    /// Bound to a physical buffer.
    Bound(TargetIndex),
}

impl Slot {
    /// The bound buffer, if any.
    #[must_use]
    pub const fn bound(self) -> Option<TargetIndex> {
        match self {
            Self::Bound(index) => Some(index),
            _ => None,
        }
    }
}

/// The allocator's view of one logical target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualTarget {
    id: TargetId,
    read: Slot,
    write: Slot,
    pending_swap: bool,
}

impl VirtualTarget {
    /// Logical target id.
    #[must_use]
    pub const fn id(&self) -> TargetId {
        self.id
    }

    /// What later passes sample.
    #[must_use]
    pub const fn read(&self) -> Slot {
        self.read
    }

    /// What the current pass renders into.
    #[must_use]
    pub const fn write(&self) -> Slot {
        self.write
    }
}

fn seed_of(id: TargetId, registry: &TargetRegistry) -> Slot {
    registry
        .find(id)
        .and_then(|t| t.read_from)
        .map_or(Slot::Unassigned, Slot::Seeded)
}

/// Virtual targets, created the first time a pass references them and kept
/// until the configuration is reloaded.
#[derive(Debug, Default)]
pub struct VirtualTargets {
    slots: Vec<VirtualTarget>,
    lookup: FxHashMap<TargetId, usize>,
}

impl VirtualTargets {
    /// No virtual targets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-seed every READ slot from its `read_from` source and clear every
    /// WRITE slot.
    pub fn reset(&mut self, registry: &TargetRegistry) {
        for vt in &mut self.slots {
            vt.read = seed_of(vt.id, registry);
            vt.write = Slot::Unassigned;
            vt.pending_swap = false;
        }
    }

    /// Forget every virtual target.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.lookup.clear();
    }

    /// The virtual target for `id`, if any pass has referenced it.
    #[must_use]
    pub fn get(&self, id: TargetId) -> Option<&VirtualTarget> {
        self.lookup.get(&id).map(|&v| &self.slots[v])
    }

    /// Number of virtual targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no pass has referenced any target yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reset and start a bake over `registry`.
    pub fn begin<'a>(
        &'a mut self,
        registry: &'a mut TargetRegistry,
    ) -> BakeSession<'a> {
        self.reset(registry);
        BakeSession {
            virtuals: self,
            registry,
            claimed: FxHashSet::default(),
            sampled: FxHashSet::default(),
            released: Vec::new(),
            pass: String::new(),
            clones_created: 0,
        }
    }

    fn ensure(&mut self, id: TargetId, registry: &TargetRegistry) -> usize {
        if let Some(&v) = self.lookup.get(&id) {
            return v;
        }
        let v = self.slots.len();
        self.slots.push(VirtualTarget {
            id,
            read: seed_of(id, registry),
            write: Slot::Unassigned,
            pending_swap: false,
        });
        let _ = self.lookup.insert(id, v);
        v
    }

    fn holders(&self, index: TargetIndex) -> usize {
        let held = Slot::Bound(index);
        self.slots
            .iter()
            .map(|vt| usize::from(vt.read == held) + usize::from(vt.write == held))
            .sum()
    }
}

/// One bake's pass-by-pass sweep over the virtual targets.
#[derive(Debug)]
pub struct BakeSession<'a> {
    virtuals: &'a mut VirtualTargets,
    registry: &'a mut TargetRegistry,
    claimed: FxHashSet<TargetIndex>,
    sampled: FxHashSet<TargetId>,
    released: Vec<TargetIndex>,
    pass: String,
    clones_created: usize,
}

impl BakeSession<'_> {
    /// Start resolving `pass`, which samples `sampled`.
    pub fn begin_pass(&mut self, pass: &str, sampled: &[TargetId]) {
        pass.clone_into(&mut self.pass);
        self.sampled.clear();
        self.sampled.extend(sampled.iter().copied());
    }

    /// Bind an output of the current pass.
    ///
    /// Write-only targets always get their own buffer and are never swapped.
    /// Other targets get their own buffer when nothing still reads it, else
    /// a free auxiliary buffer of the same shape, else a new clone.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::UnknownTarget`] for an unregistered id, or
    /// [`BakeError::TargetCreation`] if a new clone cannot be created.
    pub fn resolve_write<B: RenderBackend + ?Sized>(
        &mut self,
        id: TargetId,
        backend: &mut B,
    ) -> Result<TargetIndex, BakeError> {
        let canonical = self.canonical(id)?;
        let v = self.virtuals.ensure(id, self.registry);
        if let Slot::Bound(index) = self.virtuals.slots[v].write {
            return Ok(index);
        }
        if self.registry.get(canonical).is_write_only() {
            self.virtuals.slots[v].write = Slot::Bound(canonical);
            return Ok(canonical);
        }

        let index = if let Some(free) = self.find_free(v, canonical) {
            free
        } else {
            let clone = self.registry.create_clone(canonical, backend)?;
            self.clones_created += 1;
            clone
        };
        self.bind_write(v, index);
        Ok(index)
    }

    /// Bind an output of the current pass to the target's own buffer,
    /// never borrowing from the pool. The buffer still swaps into READ at
    /// the end of the pass. Fails if it is still held by a reader.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::UnknownTarget`] for an unregistered id, or
    /// [`BakeError::ReadWriteHazard`] if the buffer is still held.
    pub fn write_direct(&mut self, id: TargetId) -> Result<TargetIndex, BakeError> {
        let canonical = self.canonical(id)?;
        let v = self.virtuals.ensure(id, self.registry);
        if let Slot::Bound(index) = self.virtuals.slots[v].write {
            return Ok(index);
        }
        if self.registry.get(canonical).is_write_only() {
            self.virtuals.slots[v].write = Slot::Bound(canonical);
            return Ok(canonical);
        }
        if !self.is_free(canonical, v) {
            return Err(BakeError::ReadWriteHazard {
                pass: self.pass.clone(),
                target: self.registry.name_of(id),
            });
        }
        self.bind_write(v, canonical);
        Ok(canonical)
    }

    /// The buffer an input of the current pass samples. A seeded READ slot
    /// is bound here, on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::UnresolvedRead`] if nothing has written the target
    /// and it has no seed.
    pub fn resolve_read(&mut self, id: TargetId) -> Result<TargetIndex, BakeError> {
        let _ = self.canonical(id)?;
        let v = self.virtuals.ensure(id, self.registry);
        match self.virtuals.slots[v].read {
            Slot::Bound(index) => Ok(index),
            Slot::Seeded(source) => {
                let index = self.resolve_seed(source)?;
                self.virtuals.slots[v].read = Slot::Bound(index);
                let _ = self.claimed.insert(index);
                Ok(index)
            }
            Slot::Unassigned => Err(BakeError::UnresolvedRead {
                pass: self.pass.clone(),
                target: self.registry.name_of(id),
            }),
        }
    }

    /// Swap every written slot into READ and release superseded buffers
    /// nothing else holds.
    pub fn end_pass(&mut self) {
        for vt in self.virtuals.slots.iter_mut().filter(|vt| vt.pending_swap) {
            let old = std::mem::replace(&mut vt.read, vt.write);
            vt.write = Slot::Unassigned;
            vt.pending_swap = false;
            if let Slot::Bound(index) = old {
                if old != vt.read {
                    self.released.push(index);
                }
            }
        }
        for index in self.released.drain(..) {
            if self.virtuals.holders(index) == 0 {
                let _ = self.claimed.remove(&index);
            }
        }
    }

    /// The registry being baked against.
    #[must_use]
    pub fn registry(&self) -> &TargetRegistry {
        self.registry
    }

    /// Clones created by this session.
    #[must_use]
    pub const fn clones_created(&self) -> usize {
        self.clones_created
    }

    /// Buffers currently claimed by a slot.
    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    fn canonical(&self, id: TargetId) -> Result<TargetIndex, BakeError> {
        self.registry
            .index_of(id)
            .ok_or_else(|| BakeError::UnknownTarget {
                pass: self.pass.clone(),
                target: id.to_string(),
            })
    }

    fn bind_write(&mut self, v: usize, index: TargetIndex) {
        let vt = &mut self.virtuals.slots[v];
        vt.write = Slot::Bound(index);
        vt.pending_swap = true;
        let _ = self.claimed.insert(index);
    }

    fn find_free(&self, v: usize, canonical: TargetIndex) -> Option<TargetIndex> {
        if self.is_free(canonical, v) {
            return Some(canonical);
        }
        let shape = self.registry.get(canonical).shape();
        self.registry
            .auxiliaries()
            .find(|&(index, target)| {
                index != canonical
                    && target.shape() == shape
                    && self.is_free(index, v)
            })
            .map(|(index, _)| index)
    }

    /// A buffer is free for virtual target `v` when nothing claims it, or
    /// when the only holder is `v`'s own READ slot and the current pass does
    /// not sample `v`.
    fn is_free(&self, index: TargetIndex, v: usize) -> bool {
        if !self.claimed.contains(&index) {
            return true;
        }
        let vt = &self.virtuals.slots[v];
        vt.read == Slot::Bound(index)
            && !self.sampled.contains(&vt.id)
            && self.virtuals.holders(index) == 1
    }

    /// Follow a seed chain to the buffer whose contents it refers to.
    fn resolve_seed(&self, mut source: TargetId) -> Result<TargetIndex, BakeError> {
        // Declaration validation rejects cycles, so a chain visits each
        // target at most once.
        for _ in 0..self.registry.len() {
            let slot = self
                .virtuals
                .get(source)
                .map_or_else(|| seed_of(source, self.registry), VirtualTarget::read);
            match slot {
                Slot::Bound(index) => return Ok(index),
                Slot::Seeded(next) => source = next,
                Slot::Unassigned => break,
            }
        }
        self.canonical(source)
    }
}
