/*!
 * Render pipeline.
 *
 * A render walks the `RenderStage` sequence in order. Every stage is awaited
 * before the next one starts; only clip synthesis and audio attachment fan
 * out, through the bounded `ClipBatcher`.
 *
 * - `pipeline`: the stage sequence and ffmpeg invocations
 * - `batch`: bounded-concurrency per-section work
 * - `cleanup`: eager and delayed removal of intermediates
 */

use std::fmt;
use std::sync::Arc;

pub use self::batch::ClipBatcher;
pub use self::cleanup::CleanupScheduler;
pub use self::pipeline::{ClipAudio, ClipSpec, RenderOutcome, RenderPipeline, RenderPlan, SubtitleBurn};

pub mod batch;
pub mod cleanup;
pub mod pipeline;

/// Stages of one render, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderStage {
    ResolveInputs,
    SynthesizeClips,
    AttachSectionAudio,
    Concatenate,
    AttachNarration,
    BurnHeadline,
    BurnCaptions,
    Reconcile,
    Cleanup,
}

impl RenderStage {
    pub const ALL: [RenderStage; 9] = [
        Self::ResolveInputs,
        Self::SynthesizeClips,
        Self::AttachSectionAudio,
        Self::Concatenate,
        Self::AttachNarration,
        Self::BurnHeadline,
        Self::BurnCaptions,
        Self::Reconcile,
        Self::Cleanup,
    ];

    /// Following stage, `None` after cleanup
    pub fn next(self) -> Option<Self> {
        let index = self.index();
        Self::ALL.get(index + 1).copied()
    }

    /// Zero-based position in the sequence
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ResolveInputs => "resolve inputs",
            Self::SynthesizeClips => "synthesize clips",
            Self::AttachSectionAudio => "attach section audio",
            Self::Concatenate => "concatenate",
            Self::AttachNarration => "attach narration",
            Self::BurnHeadline => "burn headline",
            Self::BurnCaptions => "burn captions",
            Self::Reconcile => "reconcile duration",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Progress side channel: stage entered, plus items done and total within it
pub type ProgressCallback = Arc<dyn Fn(RenderStage, usize, usize) + Send + Sync>;
