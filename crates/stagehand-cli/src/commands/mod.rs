pub mod destroy;
pub mod trace;
