//! inklink-session: everything around a live document - the file envelope,
//! tiered saving, embed UI mode, host navigation and settings.

pub mod clock;
pub mod embed;
pub mod envelope;
pub mod host;
pub mod link_target;
pub mod pipeline;
pub mod session;
pub mod settings;
pub mod target;

pub use clock::{Clock, DebounceTimer, ManualClock, SystemClock};
pub use embed::{EmbedController, EmbedState, TransitionError};
pub use envelope::{Envelope, EnvelopeMeta, LoadedEnvelope};
pub use host::{
    CursorPos, FsHandle, FsHost, HostError, HostNavigator, Vault, open_link, suggest_paths,
};
pub use link_target::{ActiveMarkdown, LinkTarget, TargetMeta, TargetRule, compute_target};
pub use pipeline::{PersistencePipeline, PipelineConfig, SaveKind};
pub use session::{InkKind, InkSession, default_file_path};
pub use settings::Settings;
pub use target::{FileTarget, MemoryTarget, SaveTarget};
