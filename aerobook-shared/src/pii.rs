use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Contact data (emails, phone numbers) that must not show up in log lines.
///
/// `Display` keeps just enough to tell recipients apart (`r***@example.com`,
/// `******3210`); `Debug` hides everything. Serialization emits the real value
/// since API responses carry it back to its owner.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Masked(..)")
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask_contact(self.0.as_ref()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

fn mask_contact(value: &str) -> String {
    if value.is_empty() {
        return "<none>".to_string();
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => {
            let chars: Vec<char> = value.chars().collect();
            let visible = chars.len().min(4);
            let hidden = chars.len() - visible;
            let tail: String = chars[hidden..].iter().collect();
            format!("{}{}", "*".repeat(hidden.max(2)), tail)
        }
    }
}
