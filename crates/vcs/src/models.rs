/// A file read from the repository at some ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsFile {
    pub path: String,
    pub content: Vec<u8>,
    /// Git blob SHA of `content`; required to update or delete the file.
    pub sha: String,
}

/// What a tree entry does to its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    Upsert(Vec<u8>),
    Remove,
}

/// One path in a multi-file commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub change: TreeChange,
}
impl TreeEntry {
    pub fn upsert(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            change: TreeChange::Upsert(content.into()),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            change: TreeChange::Remove,
        }
    }
}
