// ABOUTME: Validated domain types shared by the image manager components.
// ABOUTME: Work requests, image references, runtime flavors, and typed object names.

mod id;
mod image_ref;
mod runtime;
mod work;

pub use id::{JobMarker, JobName, Name, PodMarker, PodName};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use runtime::{ContainerRuntime, ImageAction, RuntimeMount};
pub use work::{
    ImageCacheRef, ImageWork, ImageWorkRequest, NodeTarget, ParseImageCacheRefError,
    WorkRequestError, WorkType,
};
