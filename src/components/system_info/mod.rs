mod ui;

pub use ui::show_system_info;
