pub mod hash;
pub mod list;
pub mod record;

pub use list::Roster;
pub use record::ServerRecord;
