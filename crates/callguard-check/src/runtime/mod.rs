//! Dynamic object runtime that contracts are enforced against.
//!
//! # Architecture
//!
//! - [`Runtime`] owns the scope table, per-scope member tables, instance
//!   variables, the shared [`SignatureRegistry`](crate::registry::SignatureRegistry)
//!   and one interception layer per contracted scope.
//! - [`CallFrame`] is what a member body sees: receiver, member name, bound
//!   arguments and the current call depth.
//! - [`InterceptionLayer`] lists the member names a scope forwards through the
//!   contract checks. Which definition runs is decided at call time.
//! - [`CallError`] covers every way a call can fail, including the contract
//!   violations [`ArgumentTypeError`] and [`ReturnTypeError`].
//! - [`InterceptedCall`] records each checked call when tracing is enabled.
//!
//! # Usage
//!
//! ```ignore
//! let rt = Runtime::new();
//! let calc = rt.define_class("Calculator", None)?;
//! rt.define_method(calc, "sum", Visibility::Public, ParamList::new().required("a").required("b"),
//!     |_, frame| Ok(Value::Int(frame.int(0)? + frame.int(1)?)))?;
//! rt.compile_and_register(calc, "sum", &rt.parse_spec("[Integer, Integer] => Integer")?)?;
//! let obj = rt.new_object(calc)?;
//! rt.call(&obj, "sum", Args::new().arg(1).arg(2))?;
//! ```

mod builtins;
pub mod error;
pub mod intercept;
pub mod state;
pub mod trace;

pub use error::{ArgumentTypeError, CallError, ReturnTypeError};
pub use intercept::InterceptionLayer;
pub use state::{CallFrame, MethodBody, Runtime, RuntimeConfig};
pub use trace::InterceptedCall;
