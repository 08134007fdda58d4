//! A symmetric, bidirectional object-graph RPC core (§1).
//!
//! Two endpoints, each an independent [`Session`], exchange plain values, functions,
//! objects, and class instances over an opaque [`channel`]. Either side can be the
//! "host" of an entity and the other its "proxy"; the roles are symmetric and an
//! endpoint can be both at once. The pieces:
//!
//! - [`descriptor`]: the declarative shape of what an endpoint exposes.
//! - [`registry`]: weak-referenced bookkeeping for proxies, since this crate has no
//!   garbage collector to hook a finalizer into.
//! - [`codec`]: the recursive (de)serializer between live values and the wire form.
//! - [`call`]: call-mode negotiation (`void`/`sync`/`async`) and host-side dispatch.
//! - [`session`]: the controller tying a channel, the host and proxy registries, and
//!   call correlation together.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use srpc_core::channel::memory;
//! use srpc_core::descriptor::{FunctionDescriptor, ReturnBehavior};
//! use srpc_core::host::Value;
//! use srpc_core::Session;
//!
//! let client = Session::builder().build();
//! let server = Session::builder().build();
//! memory::loopback_pair(&client, &server);
//!
//! // Declared `sync` so the proxy call below returns the result immediately instead
//! // of requiring an `on_settle` callback.
//! server.host.register_function_with_descriptor(
//!     "add",
//!     Rc::new(|args: Vec<Value>| {
//!         let mut sum = 0i64;
//!         for arg in args {
//!             if let Value::Plain(serde_json::Value::Number(n)) = arg {
//!                 sum += n.as_i64().unwrap_or(0);
//!             }
//!         }
//!         Ok(Value::plain(sum))
//!     }),
//!     FunctionDescriptor {
//!         name: "add".to_string(),
//!         returns: ReturnBehavior::Sync,
//!         args: Vec::new(),
//!     },
//! );
//! server.push_descriptors();
//!
//! let add = client.get_proxy_function("add");
//! let result = add.call(vec![Value::plain(2), Value::plain(3)]).unwrap();
//! assert_eq!(result.unwrap().as_plain().and_then(|j| j.as_i64()), Some(5));
//! ```

pub mod call;
pub mod channel;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod ids;
pub mod proxy;
pub mod registry;
pub mod session;
pub mod value;

pub use error::{Error, ErrorKind};
pub use session::Session;
