use crate::issue::{IssueView, StateType};

/// Issues split by workflow position. Each issue lands in exactly one bucket.
#[derive(Default)]
pub struct Partition<'v, 'a> {
    pub completed: Vec<&'v IssueView<'a>>,
    pub in_progress: Vec<&'v IssueView<'a>>,
    pub backlog: Vec<&'v IssueView<'a>>,
}

impl Partition<'_, '_> {
    pub fn total(&self) -> usize {
        self.completed.len() + self.in_progress.len() + self.backlog.len()
    }
}

/// Split by state type: `completed`, `started`, and everything else.
/// Missing and unrecognized state types fall into backlog.
pub fn partition<'v, 'a: 'v>(issues: impl IntoIterator<Item = &'v IssueView<'a>>) -> Partition<'v, 'a> {
    let mut parts = Partition::default();
    for issue in issues {
        match issue.state_type() {
            Some(StateType::Completed) => parts.completed.push(issue),
            Some(StateType::Started) => parts.in_progress.push(issue),
            _ => parts.backlog.push(issue),
        }
    }
    parts
}
