pub(crate) mod binder;
pub(crate) mod call;
pub(crate) mod output;
pub(crate) mod pool;
pub(crate) mod prepare;
