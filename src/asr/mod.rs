//! ASR stage configuration: capability reconciliation and option edits.

pub mod matching;
pub mod options;
pub mod reconcile;

pub use matching::{match_language, resolve_language, LanguageMatch, MatchKind};
pub use options::{EditOutcome, OptionsEditor};
pub use reconcile::{AsrReconciler, AUTO_LANGUAGE};
