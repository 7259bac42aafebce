mod convert;
mod document;
mod format;

pub use convert::v2_to_v3;
pub use document::{
    CdrDocument, CdrV2Document, CdrV3Document, FieldOrder, ID_FIELD, MediaObject, ObjectRef,
    Record, V2Timestamp,
};
pub use format::{CdrFormat, format_id, format_timestamp, now_timestamp, timestamp_from_millis};
