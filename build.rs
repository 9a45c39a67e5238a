//! Build script for keyset.
//!
//! This emits compile-time warnings for feature flags with a runtime cost.

fn main() {
    // Emit a compile-time warning when the self-check feature is enabled
    #[cfg(feature = "self-check")]
    {
        // Note: Using single-colon syntax for MSRV 1.75.0 compatibility
        println!("cargo:warning=The 'self-check' feature is enabled.");
        println!("cargo:warning=Every KeySet::encrypt_bytes call decrypts its own output before returning.");
        println!("cargo:warning=This roughly doubles encryption cost; leave it off in production builds.");
    }
}
