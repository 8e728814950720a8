//! Content fingerprints.
//!
//! Two digests are in use and they are never compared with each other:
//!
//! - [`content_hash`]: SHA-256 of the raw bytes. Used for local and object
//!   store equality and written into the `file-hash` provenance tag.
//! - [`blob_hash`]: SHA-1 of the git blob encoding (`"blob {len}\0"` followed
//!   by the bytes). This is the SHA a VCS host reports for a file, so it can be
//!   compared directly against the destination's current version.

use derive_more::Display;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Which digest to compute.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    #[display("sha256")]
    Sha256,
    #[display("git-blob-sha1")]
    GitBlob,
}

/// Lowercase hex digest of `data` under `algorithm`.
pub fn fingerprint(algorithm: Algorithm, data: &[u8]) -> String {
    match algorithm {
        Algorithm::Sha256 => content_hash(data),
        Algorithm::GitBlob => blob_hash(data),
    }
}

/// SHA-256 of the raw bytes, as lowercase hex.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Git blob SHA-1 of `data`, as lowercase hex.
pub fn blob_hash(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"", "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")]
    #[case(b"abc", "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")]
    fn test_content_hash_known_vectors(#[case] data: &[u8], #[case] expected: &str) {
        assert_eq!(content_hash(data), expected);
        assert_eq!(fingerprint(Algorithm::Sha256, data), expected);
    }

    #[rstest]
    // `git hash-object /dev/null`
    #[case(b"", "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391")]
    // `printf 'hello\n' | git hash-object --stdin`
    #[case(b"hello\n", "ce013625030ba8dba906f756967f9e9ca394464a")]
    fn test_blob_hash_matches_git(#[case] data: &[u8], #[case] expected: &str) {
        assert_eq!(blob_hash(data), expected);
        assert_eq!(fingerprint(Algorithm::GitBlob, data), expected);
    }

    #[test]
    fn test_deterministic_and_distinct() {
        let payload = br#"{"feature": true}"#;
        assert_eq!(content_hash(payload), content_hash(payload));
        assert_ne!(content_hash(payload), content_hash(br#"{"feature": false}"#));
        assert_ne!(content_hash(payload), blob_hash(payload));
    }
}
