// ABOUTME: Command module aggregator for the fledged-imagemanager CLI.
// ABOUTME: Re-exports the image work command handler.

mod image_work;

pub use image_work::run_image_work;
