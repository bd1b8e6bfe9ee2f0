// SQLite module - a `Driver` over rusqlite so services work without a server
//
// - driver: connection handle, statement execution and transaction control
// - result: buffered native result handed to `store_result`
// - error: rusqlite error mapping and the codes this driver reports itself

pub mod driver;
pub mod error;
pub mod result;

pub use driver::SqliteDriver;
pub use result::SqliteResult;
