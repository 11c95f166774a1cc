//! Presentation state: the widget state machine, decoupled from rendering.

pub mod reducer;
pub mod state;

pub use reducer::{PipelineEvent, reduce};
pub use state::{Lifecycle, Notice, NoticeLevel, Phase, TranscriptView, UiState, Visibility};
