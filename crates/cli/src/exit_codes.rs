//! CLI Exit Code Registry
//!
//! Single source of truth for all CLI exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args, unknown station)               |
//! | 3    | Invalid config (parse or validation failure)              |
//! | 4    | Runtime failure (unreadable file, missing column, etc.)   |
//! | 5    | Unit keys excluded from reconciliation under `--strict`   |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// An input table could not be read or loaded.
pub const EXIT_RUNTIME: u8 = 4;

/// `run --strict`: some unit keys were not present in all sources.
pub const EXIT_RUN_UNMATCHED: u8 = 5;
