//! Gallery endpoint handlers.

mod jobs;
mod models;

pub use jobs::{handle_job_status, handle_jobs};
pub use models::{
    handle_add_gallery, handle_apply, handle_available, handle_delete, handle_galleries,
    handle_remove_gallery,
};
