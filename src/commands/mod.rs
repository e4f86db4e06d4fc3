pub mod food_cmd;

pub use food_cmd::{generate, parse_ingredient_list, search};
