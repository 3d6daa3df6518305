//! WebSocket transport: per-connection sessions and the live channel table.

pub mod session;
pub mod table;

pub use session::{SessionContext, run_ws_session};
pub use table::ChannelTable;
