//! High-level operations: batch transformation, concurrent deploy, alias cut-over.

pub mod alias;
pub mod deploy;
pub mod lock;
pub mod progress;
pub mod transform;

pub use alias::{promote, Promotion};
pub use deploy::{
    DeployOptions, DeployReport, Deployer, FailurePolicy, FailureStage, IndexOutcome,
};
pub use lock::DeployLock;
pub use progress::{Progress, ProgressSnapshot};
pub use transform::BatchTransformer;
