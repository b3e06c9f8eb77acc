//! Tagged per-volume outcomes for the stepper and compositor.

use std::fmt;

use crate::atlas::AtlasRegion;

/// Why a volume recorded no work this call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotReadyReason {
    /// The volume has no initial-state texture and is inert.
    MissingInitialState,
    /// The buffer read by the kernel is absent.
    MissingInputBuffer,
    /// The buffer written by the kernel is absent.
    MissingOutputBuffer,
    /// The program has no kernel with this name.
    MissingKernel(&'static str),
    /// The volume has no atlas region (the atlas is full or the volume too large).
    NoAtlasRegion,
    /// The volume's atlas region no longer matches its extent; a repack is pending.
    StaleAtlasRegion,
    /// The volume was borrowed by someone else during the call.
    Busy,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInitialState => f.write_str("no initial-state texture"),
            Self::MissingInputBuffer => f.write_str("input buffer missing"),
            Self::MissingOutputBuffer => f.write_str("output buffer missing"),
            Self::MissingKernel(name) => write!(f, "kernel '{name}' not found"),
            Self::NoAtlasRegion => f.write_str("no atlas region"),
            Self::StaleAtlasRegion => f.write_str("atlas region out of date"),
            Self::Busy => f.write_str("volume borrowed elsewhere"),
        }
    }
}

/// Whether a volume can record work right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeReadiness {
    Ready,
    NotReady(NotReadyReason),
}

impl VolumeReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Result of one volume in [`crate::FluidSimVolumeManager::simulate_volume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An `InitialState` dispatch was recorded.
    Initialized,
    /// Buffers were swapped and a `Simulate` dispatch was recorded.
    Stepped,
    /// Nothing was recorded.
    NotReady(NotReadyReason),
}

/// Per-volume outcomes of one simulation call, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub outcomes: Vec<StepOutcome>,
}

impl SimulationReport {
    pub fn initialized(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Initialized))
    }

    pub fn stepped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Stepped))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::NotReady(_)))
    }

    /// Number of dispatches recorded.
    pub fn dispatches(&self) -> usize {
        self.initialized() + self.stepped()
    }

    fn count(&self, f: impl Fn(&StepOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }
}

/// Result of one volume in [`crate::FluidSimVolumeManager::copy_texture_to_atlas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// A `CopyTexture` dispatch wrote the volume into this region.
    Copied(AtlasRegion),
    NotReady(NotReadyReason),
}

/// Per-volume outcomes of one atlas pass, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub outcomes: Vec<CopyOutcome>,
    /// The atlas layout was rebuilt before copying.
    pub repacked: bool,
    /// The refresh policy suppressed the whole pass.
    pub skipped_by_policy: bool,
}

impl CopyReport {
    pub(crate) fn skipped_by_policy() -> Self {
        Self {
            skipped_by_policy: true,
            ..Self::default()
        }
    }

    pub fn copied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CopyOutcome::Copied(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.copied()
    }
}
