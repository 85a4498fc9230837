mod condition;
mod deploy;
mod ids;
mod progress;
mod sequence;
mod view;

pub use condition::{Condition, ParseConditionError, PerCondition};
pub use deploy::{DeployMethod, DeploymentDescriptor, DeploymentDescriptorDraft, DeploymentError};
pub use ids::{ParseIdError, SessionId, ViewId};
pub use progress::{ProgressBarSettings, ProgressInfo, ProgressStyle};
pub use sequence::{Sequence, SequenceError};
pub use view::{ViewDescriptor, ViewRole};
