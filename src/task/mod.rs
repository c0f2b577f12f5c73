//! Task module - the task record, its status machine and rubric versions.
//!
//! Pure types and transition rules only; persistence lives in `store` and
//! orchestration in `workflow`.

pub mod status;
pub mod task;
pub mod versions;

pub use status::{TaskStatus, TransitionError, WorkflowStep};
pub use task::{EvalModel, Licensing, ModelEvaluation, ProfessionalSector, Task, TaskContent};
pub use versions::{rubric_field_name, RubricVersion, RubricVersions, VersionError};
