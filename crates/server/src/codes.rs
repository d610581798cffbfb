//! JSON-RPC error codes used by the server.

/// Unknown auction, player or team
pub const NOT_FOUND: i32 = -32004;
/// Bid rejected by validation
pub const BID_REJECTED: i32 = -32010;
/// Operation not allowed in the current round or auction state
pub const INVALID_STATE: i32 = -32020;
/// Sale could not be persisted
pub const PERSISTENCE: i32 = -32030;
/// Any other engine error
pub const ENGINE: i32 = -32000;
