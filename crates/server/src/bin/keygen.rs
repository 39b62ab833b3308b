//! Provision an API key for a Pulsar organization.
//!
//! Prints a freshly generated key and the SHA-256 digest to paste into
//! the server configuration. The raw key is shown exactly once and never
//! stored.
//!
//! ```sh
//! cargo run -p pulsar-server --bin keygen -- <organization-uuid> [user-uuid]
//! ```

use pulsar_core::{OrgId, UserId, generate_secret};
use pulsar_server::auth::api_key::hash_key;

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(org_raw) = args.next() else {
        eprintln!("usage: keygen <organization-uuid> [user-uuid]");
        std::process::exit(2);
    };
    let org: OrgId = match org_raw.parse() {
        Ok(org) => org,
        Err(_) => {
            eprintln!("invalid organization id: {org_raw}");
            std::process::exit(2);
        }
    };
    let user: Option<UserId> = match args.next() {
        Some(raw) => match raw.parse() {
            Ok(user) => Some(user),
            Err(_) => {
                eprintln!("invalid user id: {raw}");
                std::process::exit(2);
            }
        },
        None => None,
    };

    let key = generate_secret();
    println!("API key (share with the caller, shown once):");
    println!("  {key}");
    println!();
    println!("Configuration entry:");
    println!();
    println!("[[auth.api_keys]]");
    println!("key_hash = \"{}\"", hash_key(&key));
    println!("organization_id = \"{org}\"");
    if let Some(user) = user {
        println!("user_id = \"{user}\"");
    }
}
