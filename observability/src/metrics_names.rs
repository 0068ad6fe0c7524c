//! Operation and tag names shared by every metric the client emits.

// Session lifecycle
pub const OP_SESSION_INIT: &str = "session_init";
pub const OP_ENCRYPTION_READY_CHECK: &str = "encryption_ready_check";
pub const OP_RELAYER_PROBE: &str = "relayer_probe";

// Ciphertext operations
pub const OP_ENCRYPT: &str = "encrypt";
pub const OP_USER_DECRYPT: &str = "user_decrypt";
// Single attempt against the relayer, several of these may belong to one user decryption
pub const OP_USER_DECRYPT_ATTEMPT: &str = "user_decrypt_attempt";

// Game round
pub const OP_ROUND_POLL: &str = "round_poll";
pub const OP_PLAY_ROUND: &str = "play_round";

// Common metric tag keys
pub const TAG_OPERATION: &str = "operation";
pub const TAG_ERROR: &str = "error";
pub const TAG_HANDLE_COUNT: &str = "handle_count";
pub const TAG_OUTCOME: &str = "outcome";
