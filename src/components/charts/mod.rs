mod ui;

pub use ui::*;
