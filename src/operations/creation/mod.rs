mod make_box;

pub use make_box::{BoxGrid, MakeBox};
