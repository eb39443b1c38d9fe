//! # Engine Interface
//!
//! The narrow slice of the scripting engine's value model the bridge needs:
//! values it can build from native data ([`ScriptValue`]) and callables it
//! can hold and invoke later ([`ScriptCallable`]). Engine bindings adapt
//! their own value types to these at the binding boundary.

pub mod function;
pub mod value;

pub use function::{NativeFunction, ScriptCallable, ScriptFunction};
pub use value::ScriptValue;
