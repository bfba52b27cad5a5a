//! Baking and executing render pass chains.
//!
//! [`registry`] owns the physical targets, [`allocator`] maps logical
//! targets onto them pass by pass, [`bake()`] turns authored passes into a
//! [`PassTable`], and [`executor`] replays that table every frame.

pub mod allocator;
pub mod bake;
mod error;
pub mod executor;
pub mod pass_table;
pub mod registry;
pub mod schedule;
pub mod state_cache;

pub use allocator::{BakeSession, Slot, VirtualTarget, VirtualTargets};
pub use bake::{bake, MAX_COLOUR_OUTPUTS, MAX_INPUTS};
pub use error::BakeError;
pub use executor::{pass_constants, Camera, FrameExecutor, FrameInputs};
pub use pass_table::{
    KernelConstants, OutputBinding, PassDescriptor, PassDraw, PassTable,
    TextureBinding,
};
pub use registry::{
    PhysicalTarget, TargetFlags, TargetId, TargetIndex, TargetRegistry,
    TargetShape, MAIN_COLOUR, MAIN_DEPTH,
};
pub use schedule::{schedule_channel, ScheduleReader, SchedulePublisher};
pub use state_cache::{StateCache, DEFAULT_STATE};
