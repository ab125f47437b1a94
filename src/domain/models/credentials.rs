#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;

use std::collections::HashMap;

/// Fixed table of email to password pairs users can sign in with. Built once
/// at startup and never mutated.
#[derive(Clone, Debug)]
pub struct Credentials {
    entries: HashMap<String, String>,
}

impl Default for Credentials {
    fn default() -> Credentials {
        let entries = [
            ("0602wcp@sbcsrbox.com", "IBMskillsbuild@1234#"),
            ("scp03834@sbcsrbox.com", "PBL@4248"),
            ("scp00026@sbcsrbox.com", "Csrbox@1259"),
            ("l287wcp@sbcsrbox.com", "IBMskillsbuild@1234#"),
        ]
        .iter()
        .map(|(email, password)| {
            return (email.to_string(), password.to_string());
        })
        .collect::<HashMap<String, String>>();

        return Credentials::new(entries);
    }
}

impl Credentials {
    pub fn new(entries: HashMap<String, String>) -> Credentials {
        return Credentials { entries };
    }

    /// True only when the identifier is registered and the secret matches it
    /// exactly. Unknown identifiers and wrong secrets are not distinguished.
    pub fn verify(&self, identifier: &str, secret: &str) -> bool {
        return match self.entries.get(identifier) {
            Some(stored) => stored == secret,
            None => false,
        };
    }

    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        return self.entries.iter();
    }
}
