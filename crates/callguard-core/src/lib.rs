pub mod error;
pub mod id;
pub mod method;
pub mod scope;
pub mod symbol;
pub mod value;

// Re-export commonly used types
pub use error::CoreError;
pub use id::{ObjectId, ScopeId};
pub use method::{bind, Args, BindError, BoundArgs, KeywordParam, MethodDef, ParamList, Visibility};
pub use scope::{Attachment, ScopeDef, ScopeKind, ScopeTable};
pub use symbol::Symbol;
pub use value::{ObjectRef, Value};
