mod ui;

pub use ui::show_toolbar;
