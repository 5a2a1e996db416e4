//! `triangle` sample binary

use samples_app::triangle::Triangle;

fn main() {
    samples_app::launch::<Triangle>("Triangle", 1280, 720);
}
