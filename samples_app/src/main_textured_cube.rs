//! `textured_cube` sample binary

use samples_app::textured_cube::TexturedCube;

fn main() {
    samples_app::launch::<TexturedCube>("Textured Cube", 1280, 720);
}
