mod carts;
mod db;
mod errors;
mod orders;
mod payments;
mod settlements;

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
