pub mod charts;
pub mod dashboard;
pub mod process_view;
pub mod resource_view;
pub mod settings;
pub mod system_info;
pub mod toolbar;
