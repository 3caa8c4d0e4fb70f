//! Input, output, and object stream lifecycle management.

pub mod input;
pub mod io;
pub mod object;
pub mod output;

pub use input::InputManager;
pub use object::{BodyResponse, ObjectManager};
pub use output::OutputManager;
