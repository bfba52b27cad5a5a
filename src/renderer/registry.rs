//! Physical render-target registry.
//!
//! An arena of [`PhysicalTarget`] values addressed by [`TargetIndex`].
//! Declared targets occupy the front of the arena for the registry's whole
//! life; auxiliary clones created during baking are appended behind them and
//! only ever removed together (on resize or format change), so indices held
//! by the allocator never dangle while a bake runs.

use std::fmt;

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};

use super::error::BakeError;
use crate::config::{ScreenRatio, TargetDecl, TargetFormat, TargetSize};
use crate::gpu::{GpuHandle, RenderBackend, TargetDesc};
use crate::util::hash::hash_name;

/// Name of the built-in presentation colour target.
pub const MAIN_COLOUR: &str = "main_colour";
/// Name of the built-in presentation depth target.
pub const MAIN_DEPTH: &str = "main_depth";

const VALID_SAMPLE_COUNTS: [u32; 4] = [1, 2, 4, 8];

/// Stable identifier of a logical target: the hash of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Id of the target named `name`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(hash_name(name))
    }

    /// The raw hash.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Position of a physical target in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetIndex(usize);

impl TargetIndex {
    /// The arena slot.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

bitflags! {
    /// Physical target flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetFlags: u8 {
        /// Presentation target; never aliased, never swapped into a read
        /// slot.
        const WRITE_ONLY = 1 << 0;
        /// Member of the scratch pool, reusable by any virtual target of
        /// the same shape.
        const AUXILIARY = 1 << 1;
        /// Created by the allocator; has no logical identity of its own.
        const CLONE = 1 << 2;
    }
}

/// Everything two buffers must agree on to stand in for one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetShape {
    /// Authored size.
    pub size: TargetSize,
    /// Resolved width.
    pub width: u32,
    /// Resolved height.
    pub height: u32,
    /// Texel format.
    pub format: TargetFormat,
    /// Mip levels.
    pub mip_count: u32,
    /// MSAA samples.
    pub sample_count: u32,
}

/// One real image resource.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalTarget {
    /// Logical id (hash of `name`).
    pub id: TargetId,
    /// Author-given name, or `<source>_aux<n>` for clones.
    pub name: String,
    /// Authored size.
    pub size: TargetSize,
    /// Texel format.
    pub format: TargetFormat,
    /// Whether a full mip chain is allocated.
    pub mips: bool,
    /// Resolved mip levels.
    pub mip_count: u32,
    /// MSAA samples.
    pub sample_count: u32,
    /// Resolved width.
    pub width: u32,
    /// Resolved height.
    pub height: u32,
    /// GPU handle, [`GpuHandle::INVALID`] when unallocated.
    pub handle: GpuHandle,
    /// Flags.
    pub flags: TargetFlags,
    /// Target whose contents seed this target's first read.
    pub read_from: Option<TargetId>,
    /// The declared target a clone was copied from.
    pub clone_of: Option<TargetIndex>,
}

impl PhysicalTarget {
    /// The aliasing-relevant descriptor.
    #[must_use]
    pub const fn shape(&self) -> TargetShape {
        TargetShape {
            size: self.size,
            width: self.width,
            height: self.height,
            format: self.format,
            mip_count: self.mip_count,
            sample_count: self.sample_count,
        }
    }

    /// Backend creation parameters.
    #[must_use]
    pub fn desc(&self) -> TargetDesc {
        TargetDesc {
            label: self.name.clone(),
            width: self.width,
            height: self.height,
            format: self.format,
            mip_count: self.mip_count,
            sample_count: self.sample_count,
        }
    }

    /// Presentation target.
    #[must_use]
    pub const fn is_write_only(&self) -> bool {
        self.flags.contains(TargetFlags::WRITE_ONLY)
    }

    /// Scratch pool member.
    #[must_use]
    pub const fn is_auxiliary(&self) -> bool {
        self.flags.contains(TargetFlags::AUXILIARY)
    }

    /// Allocator-created clone.
    #[must_use]
    pub const fn is_clone(&self) -> bool {
        self.flags.contains(TargetFlags::CLONE)
    }

    /// Estimated GPU footprint in bytes, summed over all mips.
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        let texel_bytes = u64::from(self.format.block_bits() / 8);
        (0..self.mip_count)
            .map(|mip| {
                let w = u64::from((self.width >> mip).max(1));
                let h = u64::from((self.height >> mip).max(1));
                w * h * texel_bytes * u64::from(self.sample_count)
            })
            .sum()
    }
}

/// Full mip chain length for a `width` × `height` image.
#[must_use]
pub fn mip_chain_len(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Owns every physical target and its GPU handle.
#[derive(Debug)]
pub struct TargetRegistry {
    targets: Vec<PhysicalTarget>,
    lookup: FxHashMap<TargetId, TargetIndex>,
    declared: usize,
    screen: (u32, u32),
}

impl TargetRegistry {
    /// Validate `decls` and create every declared target, plus the
    /// built-in presentation targets. Nothing stays allocated on failure.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, or [`BakeError::TargetCreation`]
    /// if the backend rejects a target.
    pub fn from_config<B: RenderBackend + ?Sized>(
        decls: &[TargetDecl],
        screen: (u32, u32),
        backend: &mut B,
    ) -> Result<Self, BakeError> {
        validate(decls)?;

        let mut registry = Self {
            targets: Vec::with_capacity(decls.len() + 2),
            lookup: FxHashMap::default(),
            declared: 0,
            screen,
        };
        registry.add_back_buffers();

        for decl in decls {
            if let Err(e) = registry.add_declared(decl, backend) {
                registry.destroy_all(backend);
                return Err(e);
            }
        }
        registry.declared = registry.targets.len();

        log::debug!(
            "registry: {} declared targets at {}x{}",
            registry.declared,
            screen.0,
            screen.1
        );
        Ok(registry)
    }

    fn add_back_buffers(&mut self) {
        let (width, height) = self.screen;
        for (name, format, handle) in [
            (MAIN_COLOUR, TargetFormat::Rgba8, GpuHandle::BACK_BUFFER_COLOUR),
            (MAIN_DEPTH, TargetFormat::D24s8, GpuHandle::BACK_BUFFER_DEPTH),
        ] {
            let _ = self.push(PhysicalTarget {
                id: TargetId::from_name(name),
                name: name.to_owned(),
                size: TargetSize::Ratio(ScreenRatio::Equal),
                format,
                mips: false,
                mip_count: 1,
                sample_count: 1,
                width,
                height,
                handle,
                flags: TargetFlags::WRITE_ONLY,
                read_from: None,
                clone_of: None,
            });
        }
    }

    fn add_declared<B: RenderBackend + ?Sized>(
        &mut self,
        decl: &TargetDecl,
        backend: &mut B,
    ) -> Result<TargetIndex, BakeError> {
        let (width, height) = decl.size.resolve(self.screen);
        let mut flags = TargetFlags::empty();
        flags.set(TargetFlags::WRITE_ONLY, decl.write_only);
        flags.set(TargetFlags::AUXILIARY, decl.pingpong);

        let mut target = PhysicalTarget {
            id: TargetId::from_name(&decl.name),
            name: decl.name.clone(),
            size: decl.size,
            format: decl.format,
            mips: decl.mips,
            mip_count: if decl.mips { mip_chain_len(width, height) } else { 1 },
            sample_count: decl.samples,
            width,
            height,
            handle: GpuHandle::INVALID,
            flags,
            read_from: decl.read_from.as_deref().map(TargetId::from_name),
            clone_of: None,
        };
        target.handle = create(backend, &target)?;
        Ok(self.push(target))
    }

    fn push(&mut self, target: PhysicalTarget) -> TargetIndex {
        let index = TargetIndex(self.targets.len());
        if !target.is_clone() {
            let _ = self.lookup.insert(target.id, index);
        }
        self.targets.push(target);
        index
    }

    /// Create a scratch copy of `source`'s shape and append it to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::TargetCreation`] if the backend rejects the clone.
    pub fn create_clone<B: RenderBackend + ?Sized>(
        &mut self,
        source: TargetIndex,
        backend: &mut B,
    ) -> Result<TargetIndex, BakeError> {
        let src = self.get(source);
        let n = self
            .targets
            .iter()
            .filter(|t| t.clone_of == Some(source))
            .count();
        let name = format!("{}_aux{n}", src.name);
        let mut clone = PhysicalTarget {
            id: TargetId::from_name(&name),
            name,
            handle: GpuHandle::INVALID,
            flags: (src.flags - TargetFlags::WRITE_ONLY)
                | TargetFlags::AUXILIARY
                | TargetFlags::CLONE,
            read_from: None,
            clone_of: Some(source),
            ..src.clone()
        };
        clone.handle = create(backend, &clone)?;
        log::debug!(
            "created auxiliary '{}' ({}x{} {:?})",
            clone.name,
            clone.width,
            clone.height,
            clone.format
        );
        Ok(self.push(clone))
    }

    /// Recreate ratio-sized targets for a new back-buffer size. Every clone
    /// is destroyed first so no stale-size buffer can be reused. Returns the
    /// number of recreated targets.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::TargetCreation`] if a target cannot be recreated;
    /// that target is left unallocated.
    pub fn resize<B: RenderBackend + ?Sized>(
        &mut self,
        screen: (u32, u32),
        backend: &mut B,
    ) -> Result<usize, BakeError> {
        let _ = self.purge_clones(backend);
        self.screen = screen;

        let mut recreated = 0;
        for i in 0..self.declared {
            if !self.targets[i].size.is_ratio() {
                continue;
            }
            let (width, height) = self.targets[i].size.resolve(screen);
            let target = &mut self.targets[i];
            target.width = width;
            target.height = height;
            if target.mips {
                target.mip_count = mip_chain_len(width, height);
            }
            if target.handle.is_back_buffer() {
                continue;
            }
            self.recreate(TargetIndex(i), backend)?;
            recreated += 1;
        }
        log::info!(
            "resized to {}x{}: {recreated} targets recreated",
            screen.0,
            screen.1
        );
        Ok(recreated)
    }

    /// Change a declared target's format in place, keeping its id. Clones
    /// are purged since their shapes may no longer match.
    ///
    /// # Errors
    ///
    /// Returns [`BakeError::InvalidTarget`] for unknown or presentation
    /// targets, or [`BakeError::TargetCreation`] if recreation fails.
    pub fn change_format<B: RenderBackend + ?Sized>(
        &mut self,
        id: TargetId,
        format: TargetFormat,
        backend: &mut B,
    ) -> Result<(), BakeError> {
        let index = self.index_of(id).ok_or_else(|| BakeError::InvalidTarget {
            target: id.to_string(),
            reason: "not registered".to_owned(),
        })?;
        let target = &mut self.targets[index.0];
        if target.is_write_only() || target.handle.is_back_buffer() {
            return Err(BakeError::InvalidTarget {
                target: target.name.clone(),
                reason: "presentation targets cannot change format".to_owned(),
            });
        }
        target.format = format;
        let _ = self.purge_clones(backend);
        self.recreate(index, backend)
    }

    fn recreate<B: RenderBackend + ?Sized>(
        &mut self,
        index: TargetIndex,
        backend: &mut B,
    ) -> Result<(), BakeError> {
        let target = &mut self.targets[index.0];
        if target.handle.is_valid() {
            backend.destroy_target(target.handle);
        }
        target.handle = GpuHandle::INVALID;
        target.handle = create(backend, target)?;
        Ok(())
    }

    /// Destroy every clone. Returns how many were destroyed.
    pub fn purge_clones<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> usize {
        let clones = self.targets.len() - self.declared;
        for target in self.targets.drain(self.declared..) {
            backend.destroy_target(target.handle);
        }
        if clones > 0 {
            log::debug!("purged {clones} auxiliary targets");
        }
        clones
    }

    /// Destroy every GPU resource the registry owns and empty it.
    pub fn destroy_all<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for target in self.targets.drain(..) {
            if target.handle.is_valid() && !target.handle.is_back_buffer() {
                backend.destroy_target(target.handle);
            }
        }
        self.lookup.clear();
        self.declared = 0;
    }

    /// Arena index of a logical target.
    #[must_use]
    pub fn index_of(&self, id: TargetId) -> Option<TargetIndex> {
        self.lookup.get(&id).copied()
    }

    /// The target at `index`.
    #[must_use]
    pub fn get(&self, index: TargetIndex) -> &PhysicalTarget {
        &self.targets[index.0]
    }

    /// The logical target `id`.
    #[must_use]
    pub fn find(&self, id: TargetId) -> Option<&PhysicalTarget> {
        self.index_of(id).map(|i| self.get(i))
    }

    /// The target named `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&PhysicalTarget> {
        self.find(TargetId::from_name(name))
    }

    /// Name of a logical target for diagnostics, falling back to the hex id.
    #[must_use]
    pub fn name_of(&self, id: TargetId) -> String {
        self.find(id)
            .map_or_else(|| id.to_string(), |t| t.name.clone())
    }

    /// All targets with their indices, declared first.
    pub fn iter(&self) -> impl Iterator<Item = (TargetIndex, &PhysicalTarget)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (TargetIndex(i), t))
    }

    /// Scratch pool members, in arena order.
    pub fn auxiliaries(
        &self,
    ) -> impl Iterator<Item = (TargetIndex, &PhysicalTarget)> {
        self.iter().filter(|(_, t)| t.is_auxiliary())
    }

    /// Total number of physical targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the registry holds no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of allocator-created clones.
    #[must_use]
    pub fn clone_count(&self) -> usize {
        self.targets.len() - self.declared
    }

    /// Current back-buffer size.
    #[must_use]
    pub const fn screen(&self) -> (u32, u32) {
        self.screen
    }

    /// Estimated footprint of every allocated target in bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        self.targets
            .iter()
            .filter(|t| !t.handle.is_back_buffer())
            .map(PhysicalTarget::memory_bytes)
            .sum()
    }
}

fn create<B: RenderBackend + ?Sized>(
    backend: &mut B,
    target: &PhysicalTarget,
) -> Result<GpuHandle, BakeError> {
    backend
        .create_target(&target.desc())
        .map_err(|source| BakeError::TargetCreation {
            target: target.name.clone(),
            source,
        })
}

fn invalid(decl: &TargetDecl, reason: impl Into<String>) -> BakeError {
    BakeError::InvalidTarget {
        target: decl.name.clone(),
        reason: reason.into(),
    }
}

fn validate(decls: &[TargetDecl]) -> Result<(), BakeError> {
    let mut names = FxHashSet::default();
    let _ = names.insert(MAIN_COLOUR);
    let _ = names.insert(MAIN_DEPTH);
    for decl in decls {
        if !names.insert(decl.name.as_str()) {
            return Err(BakeError::DuplicateTarget(decl.name.clone()));
        }
    }

    let by_name: FxHashMap<&str, &TargetDecl> =
        decls.iter().map(|d| (d.name.as_str(), d)).collect();

    for decl in decls {
        if let TargetSize::Fixed([w, h]) = decl.size {
            if w == 0 || h == 0 {
                return Err(invalid(decl, format!("zero size {w}x{h}")));
            }
        }
        if !VALID_SAMPLE_COUNTS.contains(&decl.samples) {
            return Err(invalid(
                decl,
                format!("unsupported sample count {}", decl.samples),
            ));
        }
        if decl.pingpong && decl.write_only {
            return Err(invalid(decl, "write_only targets cannot be pingpong"));
        }
        if decl.mips && decl.samples > 1 {
            return Err(invalid(decl, "multisampled targets cannot have mips"));
        }

        let Some(source) = decl.read_from.as_deref() else {
            continue;
        };
        if source == MAIN_COLOUR || source == MAIN_DEPTH {
            return Err(invalid(
                decl,
                format!("read_from '{source}' is write-only"),
            ));
        }
        let Some(source_decl) = by_name.get(source) else {
            return Err(invalid(
                decl,
                format!("read_from names unknown target '{source}'"),
            ));
        };
        if source_decl.write_only {
            return Err(invalid(
                decl,
                format!("read_from '{source}' is write-only"),
            ));
        }

        // Follow the seed chain; it must terminate within decls.len() hops.
        let mut cursor = Some(source);
        let mut hops = 0;
        while let Some(name) = cursor {
            if name == decl.name {
                return Err(invalid(decl, "read_from cycle"));
            }
            hops += 1;
            if hops > decls.len() {
                break;
            }
            cursor = by_name.get(name).and_then(|d| d.read_from.as_deref());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingBackend;

    fn rgba16(name: &str, ratio: ScreenRatio) -> TargetDecl {
        TargetDecl::new(name, TargetSize::Ratio(ratio), TargetFormat::Rgba16f)
    }

    #[test]
    fn creates_declared_and_presentation_targets() {
        let mut backend = RecordingBackend::new();
        let decls = [
            rgba16("lit", ScreenRatio::Equal),
            rgba16("bloom", ScreenRatio::Half).pingpong().read_from("lit"),
            TargetDecl::new(
                "shadow",
                TargetSize::Fixed([1024, 1024]),
                TargetFormat::D24s8,
            ),
        ];
        let registry =
            TargetRegistry::from_config(&decls, (1280, 720), &mut backend)
                .unwrap();

        assert_eq!(registry.len(), 5);
        assert_eq!(backend.live_targets(), 3);

        let main = registry.by_name(MAIN_COLOUR).unwrap();
        assert!(main.is_write_only());
        assert_eq!(main.handle, GpuHandle::BACK_BUFFER_COLOUR);

        let bloom = registry.by_name("bloom").unwrap();
        assert!(bloom.is_auxiliary());
        assert_eq!((bloom.width, bloom.height), (640, 360));
        assert_eq!(bloom.read_from, Some(TargetId::from_name("lit")));

        let shadow = registry.by_name("shadow").unwrap();
        assert_eq!((shadow.width, shadow.height), (1024, 1024));
        assert!(!shadow.is_auxiliary());
    }

    #[test]
    fn rejects_inconsistent_declarations() {
        let cases: Vec<Vec<TargetDecl>> = vec![
            vec![
                rgba16("a", ScreenRatio::Equal),
                rgba16("a", ScreenRatio::Half),
            ],
            vec![rgba16("main_colour", ScreenRatio::Equal)],
            vec![rgba16("a", ScreenRatio::Equal).read_from("missing")],
            vec![rgba16("a", ScreenRatio::Equal).read_from(MAIN_COLOUR)],
            vec![
                rgba16("a", ScreenRatio::Equal).read_from("b"),
                rgba16("b", ScreenRatio::Equal).read_from("a"),
            ],
            vec![rgba16("a", ScreenRatio::Equal).pingpong().write_only()],
            vec![rgba16("a", ScreenRatio::Equal).samples(3)],
            vec![rgba16("a", ScreenRatio::Equal).samples(4).mips()],
            vec![TargetDecl::new(
                "a",
                TargetSize::Fixed([0, 16]),
                TargetFormat::Rgba8,
            )],
        ];
        for decls in cases {
            let mut backend = RecordingBackend::new();
            let result =
                TargetRegistry::from_config(&decls, (64, 64), &mut backend);
            assert!(result.is_err(), "accepted {decls:?}");
            assert_eq!(backend.live_targets(), 0);
        }
    }

    #[test]
    fn creation_failure_releases_earlier_targets() {
        let mut backend = RecordingBackend::new();
        backend.fail_format(TargetFormat::R32f);
        let decls = [
            rgba16("a", ScreenRatio::Equal),
            TargetDecl::new(
                "b",
                TargetSize::Ratio(ScreenRatio::Equal),
                TargetFormat::R32f,
            ),
        ];
        let err = TargetRegistry::from_config(&decls, (64, 64), &mut backend)
            .unwrap_err();
        assert!(matches!(
            err,
            BakeError::TargetCreation { ref target, .. } if target == "b"
        ));
        assert_eq!(backend.live_targets(), 0);
    }

    #[test]
    fn clones_copy_shape_and_join_pool() {
        let mut backend = RecordingBackend::new();
        let decls = [rgba16("blur", ScreenRatio::Quarter).samples(4)];
        let mut registry =
            TargetRegistry::from_config(&decls, (800, 600), &mut backend)
                .unwrap();
        let source = registry.index_of(TargetId::from_name("blur")).unwrap();

        let a = registry.create_clone(source, &mut backend).unwrap();
        let b = registry.create_clone(source, &mut backend).unwrap();
        assert_eq!(registry.clone_count(), 2);
        assert_eq!(registry.get(a).name, "blur_aux0");
        assert_eq!(registry.get(b).name, "blur_aux1");
        assert_eq!(registry.get(a).shape(), registry.get(source).shape());
        assert!(registry.get(a).is_clone() && registry.get(a).is_auxiliary());
        assert_ne!(registry.get(a).handle, registry.get(source).handle);
        // Clones have no logical identity.
        assert!(registry.by_name("blur_aux0").is_none());
    }

    #[test]
    fn resize_recreates_ratio_targets_and_purges_clones() {
        let mut backend = RecordingBackend::new();
        let decls = [
            rgba16("half", ScreenRatio::Half).pingpong(),
            TargetDecl::new(
                "fixed",
                TargetSize::Fixed([256, 256]),
                TargetFormat::Rgba8,
            ),
            rgba16("mipped", ScreenRatio::Equal).mips(),
        ];
        let mut registry =
            TargetRegistry::from_config(&decls, (1024, 512), &mut backend)
                .unwrap();
        let half = registry.index_of(TargetId::from_name("half")).unwrap();
        let old_half = registry.get(half).handle;
        let old_fixed = registry.by_name("fixed").unwrap().handle;
        let _ = registry.create_clone(half, &mut backend).unwrap();
        assert_eq!(registry.by_name("mipped").unwrap().mip_count, 11);

        let recreated = registry.resize((512, 256), &mut backend).unwrap();
        assert_eq!(recreated, 2);
        assert_eq!(registry.clone_count(), 0);

        let half_target = registry.get(half);
        assert_eq!((half_target.width, half_target.height), (256, 128));
        assert_ne!(half_target.handle, old_half);
        assert_eq!(half_target.id, TargetId::from_name("half"));
        assert!(backend.target(old_half).is_none());
        assert_eq!(registry.by_name("fixed").unwrap().handle, old_fixed);
        assert_eq!(registry.by_name("mipped").unwrap().mip_count, 10);
        assert_eq!(
            registry.by_name(MAIN_COLOUR).unwrap().width,
            512
        );
        // 3 declared targets live, clone destroyed.
        assert_eq!(backend.live_targets(), 3);
    }

    #[test]
    fn change_format_keeps_id() {
        let mut backend = RecordingBackend::new();
        let decls = [rgba16("lit", ScreenRatio::Equal)];
        let mut registry =
            TargetRegistry::from_config(&decls, (64, 64), &mut backend)
                .unwrap();
        let id = TargetId::from_name("lit");
        let before = registry.find(id).unwrap().handle;
        registry
            .change_format(id, TargetFormat::Rgba32f, &mut backend)
            .unwrap();
        let after = registry.find(id).unwrap();
        assert_eq!(after.format, TargetFormat::Rgba32f);
        assert_ne!(after.handle, before);
        assert!(registry
            .change_format(
                TargetId::from_name(MAIN_COLOUR),
                TargetFormat::Rgba16f,
                &mut backend
            )
            .is_err());
    }

    #[test]
    fn memory_estimate_counts_mips_and_samples() {
        let mut backend = RecordingBackend::new();
        let decls = [
            TargetDecl::new(
                "msaa",
                TargetSize::Fixed([4, 4]),
                TargetFormat::Rgba8,
            )
            .samples(4),
            TargetDecl::new(
                "mipped",
                TargetSize::Fixed([4, 4]),
                TargetFormat::R16f,
            )
            .mips(),
        ];
        let registry =
            TargetRegistry::from_config(&decls, (64, 64), &mut backend)
                .unwrap();
        // 4*4*4*4 = 256; (16 + 4 + 1) * 2 = 42
        assert_eq!(registry.memory_bytes(), 256 + 42);
    }

    #[test]
    fn mip_chain_lengths() {
        assert_eq!(mip_chain_len(1, 1), 1);
        assert_eq!(mip_chain_len(256, 64), 9);
        assert_eq!(mip_chain_len(1280, 720), 11);
    }
}
