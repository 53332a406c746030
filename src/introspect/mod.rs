pub(crate) mod descriptor;
pub(crate) mod feed;
pub(crate) mod store;
