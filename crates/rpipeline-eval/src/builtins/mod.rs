//! Functions shipped with the interpreter: message manipulation and type
//! conversion. Anything else is registered by the embedding application.

pub mod conversion;
pub mod messages;

use std::sync::Arc;

use crate::function::Function;

pub use conversion::{
    BooleanConversion, DoubleConversion, IpConversion, IsNotNull, IsNull, LongConversion,
    StringConversion,
};
pub use messages::{
    CreateMessage, DropMessage, HasField, RemoveField, RenameField, SetField, SetFields,
};

pub(crate) fn all() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(HasField::new()),
        Arc::new(SetField::new()),
        Arc::new(SetFields::new()),
        Arc::new(RemoveField::new()),
        Arc::new(RenameField::new()),
        Arc::new(CreateMessage::new()),
        Arc::new(DropMessage::new()),
        Arc::new(StringConversion::new()),
        Arc::new(LongConversion::new()),
        Arc::new(DoubleConversion::new()),
        Arc::new(BooleanConversion::new()),
        Arc::new(IpConversion::new()),
        Arc::new(IsNull::new()),
        Arc::new(IsNotNull::new()),
    ]
}
