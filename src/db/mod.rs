//! Database module - engine, connections, statements and results

mod connection;
mod engine;
mod params;
mod result;
mod row;
mod session;
mod statement;
mod transaction;

pub use connection::Connection;
pub use engine::Engine;
pub use params::{ParamSet, Value};
pub use result::ResultSet;
pub use row::{FromRow, Row, RowIndex, RowMapping};
pub use session::Session;
pub use statement::{text, Statement};
pub use transaction::TransactionMode;
