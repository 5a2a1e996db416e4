//! `boxes` sample binary

use samples_app::boxes::Boxes;

fn main() {
    samples_app::launch::<Boxes>("Boxes", 1280, 720);
}
