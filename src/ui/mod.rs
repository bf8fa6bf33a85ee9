//! Widget layer: transport controls and the interactive peaks bar.

pub mod controls;
pub mod peaks_bar;

pub use controls::ControlMessage;
pub use peaks_bar::{BarAlignment, BarGeometry, PeaksBar, PeaksBarEvent};
