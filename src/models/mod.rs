pub mod analysis;
pub mod enums;
pub mod history;
pub mod profile;

pub use analysis::{
    AnalysisResult, HistoricalValue, Indicator, IndicatorStatus, MedicationInfo, ReferenceRange,
    ResultKind,
};
pub use enums::{JobStatus, Language, MessageRole};
pub use history::{ChatMessage, HistoryItem, JobOutcome};
pub use profile::{Profile, ProfileContext};
