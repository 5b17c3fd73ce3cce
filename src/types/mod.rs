pub mod buff;
pub mod grid;
pub mod player;
pub mod spin;
pub mod symbol;

pub use buff::*;
pub use grid::*;
pub use player::*;
pub use spin::*;
pub use symbol::*;
