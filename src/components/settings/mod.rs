mod state;
mod ui;

pub use state::*;
pub use ui::show_settings_window;
