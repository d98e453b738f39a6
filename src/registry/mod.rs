//! Operation catalogue, parameter handling and dispatch.

/// The closed set of operations and their descriptors.
pub mod operation;
/// Parameter values and schemas.
pub mod params;
/// Typed per-operation requests.
pub mod request;
/// Operation bodies and their run context.
pub mod run;
/// The registry itself.
pub mod table;
