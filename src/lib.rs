pub static VERSION: &'static str = env!("CARGO_PKG_VERSION");

pub mod conf;
pub mod erx;
pub mod log;
pub mod macros;
pub mod web;

pub mod prelude {
    pub use crate::erx::{Erx, ResultE, ResultEX};
    pub use crate::web::flash::{Flash, IncomingFlash};
    pub use crate::web::middleware::gate::{Gate, GateConfig};
    pub use crate::web::middleware::input_validator::InputValidator;
    pub use crate::web::validation::{Rules, ValidationError, ValidationResult};
    pub use crate::web::{make_web, Web};
}
