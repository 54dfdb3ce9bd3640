pub mod raw;
pub mod state;
pub mod view;

pub use raw::RawIssue;
pub use state::StateType;
pub use view::{IssueSummary, IssueView, TimestampField, Transition};
