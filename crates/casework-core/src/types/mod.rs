//! Domain types for the analyst workflow.
//!
//! Each record type carries pure projection methods (`assigned`, `patched`,
//! `resolved`, ...) that compute the optimistic post-state of an action from
//! the previous state and the current time. Synchronizers feed these to the
//! mutation engine; nothing here performs I/O.

pub mod case;
pub mod note;
pub mod page;
pub mod record_id;
pub mod review;
pub mod worklist;

pub use case::{
    CaseFilter, CaseRecord, CaseStatus, CreateCaseRequest, Priority, ResolveCaseRequest,
    UpdateCaseRequest,
};
pub use note::{AnalystNote, CreateNoteRequest, NoteAuthor, NoteType, UpdateNoteRequest};
pub use page::PageRequest;
pub use record_id::RecordId;
pub use review::{
    AssignRequest, EscalateRequest, ResolveRequest, ReviewAction, ReviewStatus,
    StatusUpdateRequest, TransactionReview,
};
pub use worklist::{WorklistFilter, WorklistItem, WorklistStats};
