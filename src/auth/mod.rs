pub mod credentials;

pub use credentials::{CredentialValidator, authorization_header, caller_ip};
