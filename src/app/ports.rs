use crate::error::Result;

/// Result of writing a file into the file store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new version of the existing file was uploaded
    Replaced { file_id: String },
    /// The file did not exist and was created under a new id
    Created { file_id: String },
}

impl UploadOutcome {
    pub fn file_id(&self) -> &str {
        match self {
            UploadOutcome::Replaced { file_id } | UploadOutcome::Created { file_id } => file_id,
        }
    }
}

/// Cloud folder holding the exported logs and the run logs
pub trait FileStorePort: Send + Sync {
    /// Id of the file named `name` in `folder_id`; `FileNotFound` when absent
    fn find_file_id(&self, folder_id: &str, name: &str) -> Result<String>;

    fn download(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Upload a new version of `file_id`, or create `name` in `folder_id` when
    /// there is no such file
    fn upload_or_replace(
        &self,
        folder_id: &str,
        file_id: Option<&str>,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadOutcome>;

    fn rename(&self, file_id: &str, new_name: &str) -> Result<()>;
}

/// Where run reports are sent
pub trait NotifierPort: Send + Sync {
    fn send(&self, text: &str) -> Result<()>;
}
