//! Collects decoded parts into a [`ParseResult`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::config::ArrayPolicy;
use crate::protocol::{OneOrMany, ParseResult, UploadedFile};

/// Merges parts by name, keeping arrival order for repeated names.
///
/// Fields always follow [`ArrayPolicy::Auto`], the configured policy only applies to files.
#[derive(Debug, Default)]
pub struct PartAccumulator {
    policy: ArrayPolicy,
    fields: HashMap<String, OneOrMany<String>>,
    files: HashMap<String, OneOrMany<UploadedFile>>,
}

impl PartAccumulator {
    pub fn new(policy: ArrayPolicy) -> Self {
        Self { policy, fields: HashMap::new(), files: HashMap::new() }
    }

    pub fn add_field(&mut self, name: String, value: String) {
        insert(&mut self.fields, name, value, ArrayPolicy::Auto);
    }

    pub fn add_file(&mut self, file: UploadedFile) {
        insert(&mut self.files, file.field_name().to_string(), file, self.policy);
    }

    pub fn field_count(&self) -> usize {
        self.fields.values().map(OneOrMany::len).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.values().map(OneOrMany::len).sum()
    }

    pub fn finish(self) -> ParseResult {
        ParseResult { fields: self.fields, files: self.files }
    }
}

fn insert<T>(map: &mut HashMap<String, OneOrMany<T>>, name: String, value: T, policy: ArrayPolicy) {
    match map.entry(name) {
        Entry::Occupied(mut entry) => entry.get_mut().push(value),
        Entry::Vacant(entry) => {
            let value = match policy {
                ArrayPolicy::Auto => OneOrMany::One(value),
                ArrayPolicy::ForcedArray => OneOrMany::Many(vec![value]),
            };
            entry.insert(value);
        }
    }
}
