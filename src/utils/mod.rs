pub mod fingerprint;

pub use fingerprint::{content_hash, fingerprint, is_content_hash};
