// mobilecoder-common: shared types and name rules for the MobileCoder workspace

pub mod names;
pub mod types;
