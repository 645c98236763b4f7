//! CredentialStore port - プロセス全体の bearer credential
//!
//! Gateway は読むだけで所有しない（401 のときだけ clear する）。

pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: String);
    fn clear(&self);
}
