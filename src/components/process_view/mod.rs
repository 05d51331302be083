mod state;
mod ui;

pub use state::ProcessView;
