//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Every key/value pair of `section`, sorted by key.
    fn get_section(&self, section: &str) -> Vec<(String, String)>;
}
