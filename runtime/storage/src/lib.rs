pub mod db;
pub mod types;

pub use db::{ReadView, Store, WriteBatch};
pub use types::*;
