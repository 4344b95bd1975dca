//! WeAct ePaper panel configuration
//!
//! Covers the [WeAct Studio](https://github.com/WeActStudio) black/white panels
//! from 1.54" to 4.2".
//!
//! ### Usage
//! A panel entry goes through two steps:
//!
//! 1. validate it with [`validate::config_schema`], which checks every key and then
//! the rules that combine the model with other keys
//! 1. hand the resulting record to [`instantiate::instantiate`], which builds the
//! driver for the model's family and applies each configured key
//!
//! [`file::ConfigFile`] does both for every panel of a TOML document.
//!
//!
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod driver;
pub mod error;
pub mod file;
pub mod graphics;
pub mod instantiate;
pub mod interface;
pub mod model;
pub mod pins;
pub mod register;
pub mod schema;
pub mod units;
pub mod validate;

pub use driver::WeactEPaperTypeA;
pub use error::{ConfigError, FieldError};
pub use file::ConfigFile;
pub use instantiate::{construct, instantiate, process};
pub use model::{Family, NativeModel, PanelCatalog, PanelModel, TypeAModel, MODELS};
pub use pins::Esp32Pins;
pub use register::{DisplayRegistrar, Renderers, SpiBuses, SpiRegistrar};
pub use schema::{ConfigRecord, Context};
pub use validate::config_schema;
