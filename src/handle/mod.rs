pub(crate) mod context;
pub(crate) mod image;
pub(crate) mod transaction;
