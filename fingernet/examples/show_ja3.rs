//! Print the JA3 string and hash for each built-in fingerprint profile.
//!
//! ```sh
//! cargo run --example show_ja3
//! ```

use fingernet::fingerprint::ProfileRegistry;

fn main() {
    let registry = ProfileRegistry::with_builtins();
    for name in registry.names() {
        let spec = registry.get(&name).unwrap();
        println!("{name}");
        println!("  ja3:  {}", spec.ja3_string());
        println!("  hash: {}", spec.ja3_hash());
    }
}
