//! Configuration validation and driver instantiation for WeAct ePaper panels
pub mod weact_epaper;

pub use weact_epaper::*;
