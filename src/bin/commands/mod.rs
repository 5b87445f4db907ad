pub mod decode_cmd;
pub mod inspect_cmd;
pub mod query_cmd;

pub use decode_cmd::cmd_decode;
pub use inspect_cmd::cmd_inspect;
pub use query_cmd::cmd_query;
