pub(crate) mod registry;
pub(crate) mod typespec;
pub(crate) mod variant;
