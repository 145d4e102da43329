//! Mapper contract

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::Arguments;
use crate::error::WrappedError;

/// Adapter between raw messages and worker logic
///
/// `map_input` turns a message into what the worker is built from;
/// `map_output` turns the worker's result into what `complete` receives.
/// Use [`IdentityMapper`] when no transformation is needed.
///
/// # Example
///
/// ```
/// use jobd_daemon::{Mapper, WrappedError};
/// use serde_json::{json, Value};
///
/// struct NumberMapper;
///
/// impl Mapper for NumberMapper {
///     type Message = Value;
///     type Input = i64;
///     type Result = i64;
///     type Output = Value;
///
///     fn map_input(&self, message: &Value) -> Result<i64, WrappedError> {
///         message["number"]
///             .as_i64()
///             .ok_or_else(|| WrappedError::new("number missing").with_parameters(message.clone()))
///     }
///
///     fn map_output(&self, result: i64) -> Result<Value, WrappedError> {
///         Ok(json!({"new_number": result}))
///     }
/// }
///
/// assert_eq!(NumberMapper.map_input(&json!({"number": 10})).unwrap(), 10);
/// ```
pub trait Mapper: Send + Sync + 'static {
    /// Raw message type produced by the job source
    type Message: Send + Sync + 'static;

    /// Worker input
    type Input: Send + 'static;

    /// Worker result
    type Result: Send + 'static;

    /// Value handed to the `complete` hook
    type Output: Send + 'static;

    fn map_input(&self, message: &Self::Message) -> Result<Self::Input, WrappedError>;

    fn map_output(&self, result: Self::Result) -> Result<Self::Output, WrappedError>;
}

/// Builds a mapper per message from the daemon's mapper arguments
pub type MapperFactory<M> = Arc<dyn Fn(&Arguments) -> Result<M, WrappedError> + Send + Sync>;

/// Passes messages and results through unchanged
pub struct IdentityMapper<T, R = T> {
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<T, R> IdentityMapper<T, R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, R> Default for IdentityMapper<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> fmt::Debug for IdentityMapper<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityMapper")
    }
}

impl<T, R> Mapper for IdentityMapper<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    type Message = T;
    type Input = T;
    type Result = R;
    type Output = R;

    fn map_input(&self, message: &T) -> Result<T, WrappedError> {
        Ok(message.clone())
    }

    fn map_output(&self, result: R) -> Result<R, WrappedError> {
        Ok(result)
    }
}
