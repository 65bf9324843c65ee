pub mod upload;

pub use upload::{ReconType, ReconcileQuery, ReconcileUpload, UploadedFile};
