pub mod cursor;
pub mod registry;
pub mod relay;
