//! Validated handler bindings.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;

use super::descriptor::ArgKind;
use super::handler::{Handler, ParamSpec, Signature};
use crate::channel::Channel;
use crate::errors::{BindError, DispatchError, panic_reason};

type Invoke = dyn Fn(&Channel, Vec<Value>) -> Result<Option<Value>, DispatchError> + Send + Sync;

/// A handler checked at registration and ready to be dispatched.
///
/// Parameter strategies are computed once here and reused for every call.
#[derive(Clone)]
pub struct Caller {
    params: Vec<ParamSpec>,
    has_output: bool,
    invoke: Arc<Invoke>,
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field(
                "params",
                &self.params.iter().map(|p| p.descriptor.name).collect::<Vec<_>>(),
            )
            .field("has_output", &self.has_output)
            .finish_non_exhaustive()
    }
}

impl Caller {
    /// Bind a typed handler.
    pub fn bind<H, Args>(handler: H) -> Result<Self, BindError>
    where
        H: Handler<Args>,
    {
        Self::from_parts(H::signature(), move |channel: &Channel, args: Vec<Value>| {
            handler.call(channel, args)
        })
    }

    /// Bind an already-erased handler described by `signature`.
    ///
    /// `invoke` receives one coerced value per payload parameter.
    pub fn from_parts<F>(signature: Signature, invoke: F) -> Result<Self, BindError>
    where
        F: Fn(&Channel, Vec<Value>) -> Result<Option<Value>, DispatchError> + Send + Sync + 'static,
    {
        let Signature { inputs, outputs } = signature;
        let mut inputs = inputs.into_iter();
        let first = inputs.next().ok_or(BindError::TooFewParameters)?;
        if first.descriptor.kind != ArgKind::Context {
            return Err(BindError::NotCallable(format!(
                "first parameter must be &Channel, found {}",
                first.descriptor.name
            )));
        }
        if outputs > 1 {
            return Err(BindError::TooManyReturnValues { count: outputs });
        }
        Ok(Self {
            params: inputs.collect(),
            has_output: outputs == 1,
            invoke: Arc::new(invoke),
        })
    }

    /// Declared payload parameters (the channel excluded).
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Whether the handler declares payload parameters.
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// Whether the handler returns a value.
    pub fn has_output(&self) -> bool {
        self.has_output
    }

    /// Coerce `raw` against the declared parameters and invoke the handler.
    ///
    /// Handlers without payload parameters ignore `raw`. An empty `raw`
    /// becomes one default placeholder per parameter; otherwise arguments
    /// are matched by position, missing trailing ones default and extra
    /// ones are dropped. A panicking handler yields
    /// [`DispatchError::Panicked`].
    pub fn dispatch(
        &self,
        channel: &Channel,
        raw: &[Value],
    ) -> Result<Option<Value>, DispatchError> {
        let args = if raw.is_empty() {
            self.params.iter().map(|p| p.zero.clone()).collect()
        } else {
            self.params
                .iter()
                .enumerate()
                .map(|(i, p)| match raw.get(i) {
                    Some(value) => p.strategy.coerce(value.clone()),
                    None => p.zero.clone(),
                })
                .collect()
        };
        let result = catch_unwind(AssertUnwindSafe(|| (self.invoke)(channel, args)))
            .map_err(|payload| DispatchError::Panicked(panic_reason(payload.as_ref())))??;
        Ok(if self.has_output { result } else { None })
    }
}
