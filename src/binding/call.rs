use std::collections::BTreeMap;
use std::time::Duration;

use crate::binding::binder::Binder;
use crate::binding::output::OutputBundle;
use crate::binding::pool::PendingCall;
use crate::foundation::error::BindResult;
use crate::foundation::value::Value;
use crate::handle::image::ImageHandle;

/// Builder for one call through a [`Binder`].
///
/// Positional arguments fill the operation's required inputs in order; `opt` supplies optional
/// inputs by name.
#[must_use = "a CallBuilder does nothing until invoked"]
pub struct CallBuilder<'a> {
    binder: &'a Binder,
    name: &'a str,
    positional: Vec<Value>,
    optional: BTreeMap<String, Value>,
}

impl<'a> CallBuilder<'a> {
    pub(crate) fn new(binder: &'a Binder, name: &'a str) -> Self {
        Self {
            binder,
            name,
            positional: Vec::new(),
            optional: BTreeMap::new(),
        }
    }

    /// Append the next positional (required) input.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set an optional input. Setting the same name twice keeps the last value.
    pub fn opt(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.optional.insert(name.into(), value.into());
        self
    }

    pub fn invoke(self) -> BindResult<OutputBundle> {
        self.binder.invoke(self.name, &self.positional, &self.optional)
    }

    pub fn submit(self) -> BindResult<PendingCall<OutputBundle>> {
        self.binder.submit(self.name, &self.positional, &self.optional)
    }

    pub fn invoke_timeout(self, timeout: Duration) -> BindResult<OutputBundle> {
        self.submit()?.wait_timeout(timeout)
    }

    /// Invoke and return the first output as an image.
    pub fn image(self) -> BindResult<ImageHandle> {
        self.invoke()?.into_image()
    }
}
