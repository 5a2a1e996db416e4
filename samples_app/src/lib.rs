//! Rendering samples built on `vk_boilerplate`
//!
//! Each sample is a [`Sample`] implementation with its own binary:
//! - **triangle**: a hard-coded vertex buffer and no descriptors
//! - **boxes**: instanced cubes with Phong lighting and a fly camera
//! - **textured_cube**: one cube sampling a PNG/JPEG texture
//! - **gltf_viewer**: a glTF scene in shared buffers with a bindless texture
//!   array

pub mod boxes;
pub mod gltf_viewer;
pub mod shaders;
pub mod textured_cube;
pub mod triangle;

use vk_boilerplate::config::SampleConfig;
use vk_boilerplate::foundation::logging;
use vk_boilerplate::{run, Sample};

/// Configure logging, run `S` and exit the process
///
/// Exits with status 1 after logging the error if anything fails.
pub fn launch<S: Sample>(title: &str, width: u32, height: u32) -> ! {
    let config = match SampleConfig::new(title, width, height).with_overrides() {
        Ok(config) => config,
        Err(e) => {
            logging::init(log::LevelFilter::Info);
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    logging::init(logging::parse_level(&config.log_level));

    match run::<S>(config) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
