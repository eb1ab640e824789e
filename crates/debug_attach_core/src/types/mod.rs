mod requests;
pub(crate) mod responses;

pub use requests::{AttachRequest, EditorKind, WorkspaceKind, REQUEST_TYPE};
pub use responses::{AttachOutcome, AttachResponse, ResolvedAttachTarget};
