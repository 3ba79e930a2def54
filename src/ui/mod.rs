pub mod dialogs;
pub mod heatmap;
pub mod panels;
