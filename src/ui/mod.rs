pub mod column_dialog;
pub mod results_panel;
pub mod settings_dialog;
