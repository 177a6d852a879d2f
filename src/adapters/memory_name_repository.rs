//! In-memory instrument-name repository.

use crate::domain::fundamentals::normalize_code;
use crate::ports::name_port::NameRepository;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryNameRepository {
    names: HashMap<String, String>,
}

impl MemoryNameRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameRepository for MemoryNameRepository {
    fn lookup(&self, code: &str) -> Option<String> {
        self.names.get(&normalize_code(code)).cloned()
    }

    fn populate(&mut self, entries: &[(String, String)]) {
        for (code, name) in entries {
            let name = name.trim();
            // a name equal to the code carries no information
            if name.is_empty() || name == code {
                continue;
            }
            self.names
                .insert(normalize_code(code), name.to_string());
        }
    }
}
