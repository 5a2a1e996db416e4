//! `gltf_viewer` sample binary
//!
//! Usage: `gltf_viewer [model.gltf | model.glb]`; without an argument the
//! default model under the asset directory is shown.

use samples_app::gltf_viewer::GltfViewer;

fn main() {
    samples_app::launch::<GltfViewer>("glTF Viewer", 1280, 720);
}
