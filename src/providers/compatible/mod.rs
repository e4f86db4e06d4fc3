pub mod compatible;

pub use compatible::CompatibleProvider;
