/*!
 * Translation orchestration.
 *
 * - `orchestrator`: runs engines under a selection mode
 * - `scenes`: scene to engine routing
 * - `prompts`: prompt templates and per-engine overrides
 */

pub use self::orchestrator::{AnalysisOutcome, OrchestrationRequest, OrchestrationService};
pub use self::prompts::{PromptKind, PromptTemplate};

pub mod orchestrator;
pub mod prompts;
pub mod scenes;
